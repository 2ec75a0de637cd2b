//! The ignored-errors allow-list persisted in `ignored_errors.json`.

use crate::error::Result;
use crate::json::{read_json_or_default, write_json_pretty};
use camino::{Utf8Path, Utf8PathBuf};
use modset_core::{IgnoredError, IgnoredErrors};

pub const IGNORED_ERRORS_FILE: &str = "ignored_errors.json";

#[derive(Debug, Clone)]
pub struct IgnoredErrorStore {
    path: Utf8PathBuf,
}

impl IgnoredErrorStore {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            path: root.join(IGNORED_ERRORS_FILE),
        }
    }

    pub fn load(&self) -> Result<IgnoredErrors> {
        read_json_or_default(&self.path)
    }

    pub fn save(&self, ignored: &IgnoredErrors) -> Result<()> {
        write_json_pretty(&self.path, ignored)
    }

    /// Returns `false` if the entry was already ignored.
    pub fn ignore(&self, entry: IgnoredError) -> Result<bool> {
        let mut ignored = self.load()?;
        let added = ignored.insert(entry);
        if added {
            self.save(&ignored)?;
        }
        Ok(added)
    }

    /// Returns `false` if the entry was not ignored.
    pub fn unignore(&self, entry: &IgnoredError) -> Result<bool> {
        let mut ignored = self.load()?;
        let removed = ignored.remove(entry);
        if removed {
            self.save(&ignored)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modset_core::{ErrorKind, ModUid};
    use tempfile::TempDir;

    #[test]
    fn test_ignore_round_trips() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = IgnoredErrorStore::new(&root);

        let entry = IgnoredError {
            kind: ErrorKind::MissingDependency,
            member: ModUid::local("x"),
            offending: Some("y".into()),
        };
        assert!(store.ignore(entry.clone()).unwrap());
        assert!(!store.ignore(entry.clone()).unwrap());

        let loaded = store.load().unwrap();
        assert!(loaded.contains(ErrorKind::MissingDependency, &ModUid::local("x"), Some("y")));

        assert!(store.unignore(&entry).unwrap());
        assert!(store.load().unwrap().is_empty());
    }
}
