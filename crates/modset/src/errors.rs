use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Could not determine a data directory")]
    #[diagnostic(
        code(data_dir::unavailable),
        help("Pass --data-dir or set the MODSET_DATA_DIR environment variable")
    )]
    DataDirUnavailable,

    #[error("No record snapshot found at {path}")]
    #[diagnostic(
        code(snapshot::missing),
        help("Run `modset fetch` first to load mods from your sources")
    )]
    NoSnapshot { path: Utf8PathBuf },

    #[error("Collection not found: {name}")]
    #[diagnostic(
        code(collection::not_found),
        help("Run `modset collection list` to see the saved collections")
    )]
    CollectionNotFound { name: String },

    #[error("Invalid mod uid: {value}")]
    #[diagnostic(
        code(uid::invalid),
        help("Mod uids look like `local:<folder>`, `legacy:<folder>` or `remote:<numeric id>`")
    )]
    InvalidUid { value: String },

    #[error("Unknown source: {value}")]
    #[diagnostic(code(search::invalid_source), help("Use one of: local, remote, legacy"))]
    InvalidSource { value: String },

    #[error("Unknown error kind: {value}")]
    #[diagnostic(
        code(ignore::invalid_kind),
        help("Use one of: invalidId, notSubscribed, notInstalled, needsUpdate, missingDependency, incompatibleMod")
    )]
    InvalidErrorKind { value: String },

    #[error("Collection '{collection}' has {failing} failing member(s)")]
    #[diagnostic(
        code(validate::failed),
        help("Fix the listed errors, or suppress them with `modset ignore`")
    )]
    ValidationFailed { collection: String, failing: usize },

    #[error("Nothing to change for {uid}")]
    #[diagnostic(
        code(overrides::empty),
        help("Pass --id, --tag or --clear")
    )]
    EmptyOverride { uid: String },

    #[error(transparent)]
    #[diagnostic(code(store::error))]
    Store(#[from] modset_store::Error),

    #[error(transparent)]
    #[diagnostic(code(engine::error))]
    Engine(#[from] modset_core::Error),
}

impl CliError {
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    pub fn invalid_uid(value: impl Into<String>) -> Self {
        Self::InvalidUid {
            value: value.into(),
        }
    }
}
