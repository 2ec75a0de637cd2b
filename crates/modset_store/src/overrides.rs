//! User identity overrides persisted in `overrides.json`.

use crate::error::Result;
use crate::json::{read_json_or_default, write_json_pretty};
use camino::{Utf8Path, Utf8PathBuf};
use modset_core::{ModOverride, ModUid, Overrides};
use std::collections::BTreeMap;

pub const OVERRIDES_FILE: &str = "overrides.json";

#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: Utf8PathBuf,
}

impl OverrideStore {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            path: root.join(OVERRIDES_FILE),
        }
    }

    pub fn load(&self) -> Result<Overrides> {
        let stored: BTreeMap<ModUid, ModOverride> = read_json_or_default(&self.path)?;
        Ok(stored.into_iter().collect())
    }

    pub fn save(&self, overrides: &Overrides) -> Result<()> {
        // Stable key order on disk
        let sorted: BTreeMap<&ModUid, &ModOverride> = overrides
            .iter()
            .filter(|(_, o)| !o.is_empty())
            .collect();
        write_json_pretty(&self.path, &sorted)
    }

    /// Replace the override for `uid`. An empty override removes the entry.
    pub fn set(&self, uid: ModUid, entry: ModOverride) -> Result<()> {
        let mut overrides = self.load()?;
        if entry.is_empty() {
            overrides.remove(&uid);
            tracing::info!(%uid, "Cleared override");
        } else {
            tracing::info!(%uid, ?entry, "Set override");
            overrides.insert(uid, entry);
        }
        self.save(&overrides)
    }
}
