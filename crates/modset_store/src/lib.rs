//! On-disk state for modset.
//!
//! Everything lives under one data directory:
//!
//! | File                  | Contents                               |
//! |-----------------------|----------------------------------------|
//! | `config.toml`         | [`Settings`]                           |
//! | `collections.json`    | every saved [`Collection`](modset_core::Collection) |
//! | `overrides.json`      | user identity overrides, keyed by uid  |
//! | `ignored_errors.json` | the ignored-errors allow-list          |
//! | `records.json`        | the record set of the last load cycle  |

pub mod collections;
pub mod error;
pub mod ignored;
mod json;
pub mod overrides;
pub mod settings;
pub mod snapshot;

pub use collections::CollectionStore;
pub use error::{Error, Result};
pub use ignored::IgnoredErrorStore;
pub use overrides::OverrideStore;
pub use settings::{load_settings, save_settings, Settings};
pub use snapshot::{RecordSnapshot, SnapshotStore};

use camino::{Utf8Path, Utf8PathBuf};

/// Handle to a data directory and the stores inside it.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: Utf8PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if needed.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn settings(&self) -> Settings {
        load_settings(&self.root)
    }

    pub fn collections(&self) -> CollectionStore {
        CollectionStore::new(self.root.clone())
    }

    pub fn overrides(&self) -> OverrideStore {
        OverrideStore::new(&self.root)
    }

    pub fn ignored_errors(&self) -> IgnoredErrorStore {
        IgnoredErrorStore::new(&self.root)
    }

    pub fn snapshot(&self) -> SnapshotStore {
        SnapshotStore::new(&self.root)
    }
}
