//! Small JSON file helpers shared by the stores.

use crate::error::Result;
use camino::Utf8Path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;

/// Read `path` as JSON, or `T::default()` when the file does not exist.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Utf8Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write `value` as pretty JSON, creating parent directories.
///
/// The data goes to a sibling temp file that is then renamed over `path`.
pub(crate) fn write_json_pretty<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
