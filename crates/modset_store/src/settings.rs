//! Application settings stored in `config.toml`.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use modset_core::{FetchConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const SETTINGS_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Folder holding local mods, one sub-folder per mod.
    pub local_mods_path: Option<Utf8PathBuf>,
    /// Folder holding legacy-format packages.
    pub legacy_mods_path: Option<Utf8PathBuf>,
    /// Catalog snapshot JSON served as the remote catalog.
    pub catalog_snapshot_path: Option<Utf8PathBuf>,
    pub page_size: u32,
    pub chunk_size: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub lookup_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            local_mods_path: None,
            legacy_mods_path: None,
            catalog_snapshot_path: None,
            page_size: fetch.page_size,
            chunk_size: fetch.chunk_size,
            max_attempts: fetch.retry.max_attempts,
            retry_delay_ms: fetch.retry.delay.as_millis() as u64,
            lookup_timeout_ms: fetch.lookup_timeout.as_millis() as u64,
        }
    }
}

impl Settings {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            page_size: self.page_size.max(1),
            chunk_size: self.chunk_size.max(1),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                delay: Duration::from_millis(self.retry_delay_ms),
            },
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
        }
    }
}

pub fn settings_path(data_dir: &Utf8Path) -> Utf8PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// Load settings from `<data_dir>/config.toml`, returning defaults if the file
/// is missing or cannot be parsed.
pub fn load_settings(data_dir: &Utf8Path) -> Settings {
    let path = settings_path(data_dir);
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Settings::default();
    }

    match fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(settings) => {
                tracing::debug!("Loaded settings from {}", path);
                settings
            }
            Err(e) => {
                tracing::error!("Failed to parse settings file: {}", e);
                Settings::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read settings file: {}", e);
            Settings::default()
        }
    }
}

pub fn save_settings(data_dir: &Utf8Path, settings: &Settings) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let path = settings_path(data_dir);
    let contents = toml::to_string_pretty(settings)?;
    fs::write(&path, contents)?;
    tracing::info!("Saved settings to {}", path);
    Ok(())
}
