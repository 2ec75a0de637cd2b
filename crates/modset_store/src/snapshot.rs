//! The record set of the last load cycle, cached in `records.json`.

use crate::error::Result;
use crate::json::write_json_pretty;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use modset_core::{FetchOutcome, ModRecord, RemoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;

pub const RECORDS_FILE: &str = "records.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<ModRecord>,
    #[serde(default)]
    pub invalid: BTreeSet<RemoteId>,
}

impl From<FetchOutcome> for RecordSnapshot {
    fn from(outcome: FetchOutcome) -> Self {
        Self {
            fetched_at: Utc::now(),
            records: outcome.records,
            invalid: outcome.invalid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: Utf8PathBuf,
}

impl SnapshotStore {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            path: root.join(RECORDS_FILE),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// `None` if no load cycle has been saved yet.
    pub fn load(&self) -> Result<Option<RecordSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save(&self, snapshot: &RecordSnapshot) -> Result<()> {
        write_json_pretty(&self.path, snapshot)?;
        tracing::debug!(path = %self.path, records = snapshot.records.len(), "Saved record snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_snapshot_is_none() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = SnapshotStore::new(&root);
        assert!(store.load().unwrap().is_none());

        let snapshot = RecordSnapshot::from(FetchOutcome {
            records: vec![ModRecord::remote(RemoteId(3), "Three")],
            invalid: BTreeSet::from([RemoteId(4)]),
        });
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }
}
