//! Mod registry and collection validation engine.
//!
//! This crate turns raw mod observations from several sources into one
//! consistent registry and checks user collections against it:
//!
//! - **Dependency fetching**: page through subscriptions and expand the
//!   transitive dependency frontier in chunks, with bounded retry and
//!   monotonic progress
//! - **Descriptor resolution**: collapse records sharing a stable key into one
//!   canonical identity and build both dependency edge indexes
//! - **Collection validation**: per-member error sets plus an aggregate verdict
//!   that honours a persisted ignored-errors list
//!
//! # Example
//!
//! ```no_run
//! use modset_core::{
//!     resolve_registry, validate_collection, Collection, DependencyFetcher, FetchConfig,
//!     FolderSource, InMemoryCatalog, Overrides,
//! };
//! use camino::Utf8Path;
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! # async fn run() -> modset_core::Result<()> {
//! let catalog = InMemoryCatalog::load(Utf8Path::new("catalog.json"))?;
//! let fetcher = DependencyFetcher::new(FetchConfig::default(), Arc::new(catalog))
//!     .with_source(Arc::new(FolderSource::local("/path/to/mods")))
//!     .with_progress(|p| println!("{:>3.0}% {}", p.fraction * 100.0, p.message));
//!
//! let outcome = fetcher.fetch_all(&BTreeSet::new()).await;
//! let registry = resolve_registry(outcome.records, &Overrides::new())?;
//!
//! let collection = Collection::new("id", "Main");
//! for (uid, errors) in validate_collection(&registry, &collection) {
//!     println!("{}: {:?}", uid, errors);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod collection;
pub mod descriptor;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod sources;
pub mod validator;

// Re-export main types
pub use cancel::{Generation, Ticket};
pub use collection::{
    Collection, ErrorKind, IgnoredError, IgnoredErrors, MissingDependency, ModErrorSet,
};
pub use descriptor::{DescriptorId, ModDescriptor, ModOverride};
pub use error::{Error, Result};
pub use fetcher::{
    CatalogClient, DependencyFetcher, FetchConfig, FetchOutcome, RecordSource, RetryPolicy,
    SubscribedPage,
};
pub use identity::{DependencyHint, ModUid, RemoteId, SourceKind};
pub use progress::{FetchProgress, FetchTask, ProgressAggregator};
pub use record::{ModRecord, RemoteState, RemoteStatePatch, StateTransition};
pub use resolver::{resolve_registry, ModRow, Overrides, Registry, RegistryCell, RowFilter};
pub use sources::{CatalogSnapshot, FolderSource, InMemoryCatalog, ModManifest, StaticSource};
pub use validator::{validate_collection, ErrorMap, ValidationReport, ValidationService};
