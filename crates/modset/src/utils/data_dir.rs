//! Data directory resolution.

use crate::errors::{CliError, CliResult};
use camino::Utf8PathBuf;
use directories_next::ProjectDirs;
use std::env;

pub const DATA_DIR_ENV: &str = "MODSET_DATA_DIR";

/// Fallback used when no platform data directory exists.
const LOCAL_DATA_DIR: &str = ".modset";

/// Resolve the data directory: `--data-dir`, then `MODSET_DATA_DIR`, then the
/// platform data directory, then `./.modset`.
pub fn resolve_data_dir(flag: Option<&str>) -> CliResult<Utf8PathBuf> {
    let resolved = pick_data_dir(flag, env::var(DATA_DIR_ENV).ok(), platform_data_dir());
    if resolved.as_str().is_empty() {
        return Err(CliError::DataDirUnavailable);
    }
    tracing::debug!(data_dir = %resolved, "Resolved data directory");
    Ok(resolved)
}

fn platform_data_dir() -> Option<Utf8PathBuf> {
    let dirs = ProjectDirs::from("", "", "modset")?;
    Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf()).ok()
}

fn pick_data_dir(
    flag: Option<&str>,
    env_value: Option<String>,
    platform: Option<Utf8PathBuf>,
) -> Utf8PathBuf {
    let non_empty = |s: &str| !s.trim().is_empty();
    flag.filter(|s| non_empty(s))
        .map(Utf8PathBuf::from)
        .or_else(|| env_value.filter(|s| non_empty(s)).map(Utf8PathBuf::from))
        .or(platform)
        .unwrap_or_else(|| Utf8PathBuf::from(LOCAL_DATA_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let platform = Some(Utf8PathBuf::from("/platform"));
        assert_eq!(
            pick_data_dir(Some("/flag"), Some("/env".into()), platform.clone()),
            Utf8PathBuf::from("/flag")
        );
        assert_eq!(
            pick_data_dir(None, Some("/env".into()), platform.clone()),
            Utf8PathBuf::from("/env")
        );
        assert_eq!(
            pick_data_dir(Some("  "), Some(String::new()), platform),
            Utf8PathBuf::from("/platform")
        );
        assert_eq!(pick_data_dir(None, None, None), Utf8PathBuf::from(".modset"));
    }
}
