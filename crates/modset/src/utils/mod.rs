use crate::errors::{CliError, CliResult};
use modset_core::{ModUid, Registry, RegistryCell};
use modset_store::DataDir;
use std::sync::Arc;

pub mod data_dir;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

pub fn parse_uid(value: &str) -> CliResult<ModUid> {
    value.trim().parse().map_err(|_| CliError::invalid_uid(value))
}

/// Resolve the registry from the saved record snapshot and the user overrides.
pub async fn load_registry(data_dir: &DataDir) -> CliResult<Arc<Registry>> {
    let snapshot_store = data_dir.snapshot();
    let snapshot = snapshot_store.load()?.ok_or_else(|| CliError::NoSnapshot {
        path: snapshot_store.path().to_path_buf(),
    })?;
    let overrides = data_dir.overrides().load()?;

    tracing::debug!(
        records = snapshot.records.len(),
        fetched_at = %snapshot.fetched_at,
        "Resolving registry from snapshot"
    );
    let cell = RegistryCell::new();
    Ok(cell.rebuild(snapshot.records, overrides).await?)
}

/// Display name of a uid, falling back to the uid itself.
pub fn display_name(registry: Option<&Registry>, uid: &ModUid) -> String {
    registry
        .and_then(|r| r.record(uid))
        .map(|record| record.display_name().to_string())
        .unwrap_or_else(|| uid.to_string())
}
