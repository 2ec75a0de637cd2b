//! Error types for the on-disk stores.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse settings: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Core(#[from] modset_core::Error),

    /// Collection names must be non-empty after trimming.
    #[error("Collection name cannot be empty")]
    EmptyName,

    #[error("Collection '{0}' already exists")]
    DuplicateName(String),

    #[error("Collection '{0}' not found")]
    NotFound(String),
}
