//! Error types for registry, fetch and validation operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. External error types (`std::io::Error`, `serde_json::Error`)
//! are automatically converted via `From` impls.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, resolving or validating mods.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (scanning a mod folder, reading a manifest).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (manifests, catalog snapshots).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mod source directory is missing or is not a directory.
    #[error("Invalid source directory: {0}")]
    InvalidSourceDir(Utf8PathBuf),

    /// A `<source>:<key>` identity string could not be parsed.
    #[error("Invalid mod uid '{0}'")]
    InvalidUid(String),

    /// The remote catalog rejected or failed a call.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A call to the remote catalog did not complete in time.
    #[error("Catalog call timed out after {0} ms")]
    Timeout(u64),

    /// The run was superseded by a newer rebuild or validation pass.
    ///
    /// This is not a failure: callers should drop the result silently.
    #[error("Superseded by a newer run")]
    Cancelled,

    /// An internal failure while resolving or validating (e.g. a malformed record).
    /// Carries the original cause as text.
    #[error("Internal resolution error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error only signals that a newer run replaced this one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
