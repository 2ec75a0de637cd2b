//! Dependency fetching across local folders and the remote catalog.
//!
//! [`DependencyFetcher::fetch_all`] produces the record set for one load cycle:
//!
//! 1. List every [`RecordSource`] (local and legacy folders). A failing source
//!    counts as zero records.
//! 2. Page through the subscription listing until a page yields no new items,
//!    resolving each page with one batched detail call.
//! 3. Expand the dependency frontier breadth-first in fixed-size chunks. The
//!    frontier starts with the seed identities and grows with every remote
//!    dependency referenced by a resolved record. Each remote id is attempted
//!    at most once; whatever a chunk fails to resolve is marked invalid and
//!    never retried.
//! 4. Emit the completion progress event as the last action.
//!
//! Pages and chunks are fetched one at a time. Only the submitter lookups
//! inside one page or chunk run concurrently.

use crate::error::{Error, Result};
use crate::identity::{ModUid, RemoteId, SourceKind};
use crate::progress::{FetchProgress, FetchTask, ProgressAggregator, ProgressCallback};
use crate::record::ModRecord;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One page of the remote subscription listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedPage {
    pub items: Vec<ModRecord>,
    /// Total reported by the catalog. Informational only, the list may change mid-fetch.
    pub total_items: u64,
    pub num_returned: u64,
}

/// The remote workshop catalog (allows mocking in tests).
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// List one page of the user's subscriptions. Pages are 1-based.
    async fn list_subscribed_page(&self, page: u32, page_size: u32) -> Result<SubscribedPage>;

    /// Fetch full records for a batch of remote ids. Unknown, deleted or
    /// private ids are simply absent from the result.
    async fn fetch_details(&self, ids: &[RemoteId]) -> Result<Vec<ModRecord>>;

    /// Resolve a submitter's display name.
    async fn lookup_submitter(&self, user_id: u64) -> Result<String>;
}

/// A source of non-remote records, such as a local mods folder.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn list_records(&self) -> Result<Vec<ModRecord>>;
}

/// Bounded retry for catalog calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Run `call` until it succeeds or the attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    tracing::debug!(operation, attempt, error = %e, "Catalog call failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Configuration for the dependency fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Items requested per subscription page.
    pub page_size: u32,
    /// Remote ids per frontier detail call.
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Timeout for each submitter lookup.
    pub lookup_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            chunk_size: 50,
            retry: RetryPolicy::default(),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of one load cycle.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Every resolved record, ordered by uid.
    pub records: Vec<ModRecord>,
    /// Remote ids that were attempted and did not resolve. Excluded for the
    /// rest of the cycle.
    pub invalid: BTreeSet<RemoteId>,
}

/// Orchestrates a full load cycle.
///
/// # Example
///
/// ```ignore
/// let fetcher = DependencyFetcher::new(FetchConfig::default(), Arc::new(catalog))
///     .with_source(Arc::new(FolderSource::local(mods_dir)))
///     .with_progress(|p| println!("{:.0}% {}", p.fraction * 100.0, p.message));
/// let outcome = fetcher.fetch_all(&seeds).await;
/// ```
pub struct DependencyFetcher<C: CatalogClient> {
    config: FetchConfig,
    catalog: Arc<C>,
    sources: Vec<Arc<dyn RecordSource>>,
    progress: Option<ProgressCallback>,
}

impl<C: CatalogClient> DependencyFetcher<C> {
    pub fn new(config: FetchConfig, catalog: Arc<C>) -> Self {
        Self {
            config,
            catalog,
            sources: Vec::new(),
            progress: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Register a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(FetchProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every local record, every subscription, and everything reachable
    /// from them or from `seeds` by remote dependency.
    ///
    /// Source and catalog failures are logged and recovered from, so this never
    /// fails as a whole. Whatever resolved is returned.
    pub async fn fetch_all(&self, seeds: &BTreeSet<RemoteId>) -> FetchOutcome {
        let mut run = FetchRun {
            records: BTreeMap::new(),
            invalid: BTreeSet::new(),
            attempted: BTreeSet::new(),
            submitters: HashMap::new(),
            progress: ProgressAggregator::new(self.progress.clone()),
        };

        tracing::info!(
            sources = self.sources.len(),
            seeds = seeds.len(),
            "Starting load cycle"
        );

        self.scan_sources(&mut run).await;
        self.fetch_subscriptions(&mut run).await;
        self.expand_frontier(&mut run, seeds).await;

        let outcome = FetchOutcome {
            records: run.records.into_values().collect(),
            invalid: run.invalid,
        };
        tracing::info!(
            records = outcome.records.len(),
            invalid = outcome.invalid.len(),
            "Load cycle finished"
        );

        run.progress
            .finish(format!("Loaded {} mods", outcome.records.len()));
        outcome
    }

    async fn scan_sources(&self, run: &mut FetchRun) {
        run.progress.schedule(
            FetchTask::LocalScan,
            self.sources.len() as u64,
            "Scanning mod folders",
        );

        for source in &self.sources {
            let kind = source.kind();
            match source.list_records().await {
                Ok(records) => {
                    tracing::debug!(source = %kind, count = records.len(), "Listed source");
                    for record in records {
                        if record.source_type == SourceKind::Remote {
                            tracing::warn!(uid = %record.uid, "Record source yielded a remote record, skipping");
                            continue;
                        }
                        run.insert(record);
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %kind, error = %e, "Failed to list source, treating as empty");
                }
            }
            run.progress
                .advance(FetchTask::LocalScan, 1, format!("Scanned {} mods", kind));
        }
    }

    async fn fetch_subscriptions(&self, run: &mut FetchRun) {
        let catalog = &*self.catalog;
        let page_size = self.config.page_size.max(1);
        let mut page = 1u32;

        loop {
            let listing = self
                .config
                .retry
                .run("list_subscribed_page", move || {
                    catalog.list_subscribed_page(page, page_size)
                })
                .await;

            let listing = match listing {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Subscription listing failed, stopping");
                    break;
                }
            };

            let fresh: Vec<ModRecord> = listing
                .items
                .into_iter()
                .filter(|item| item.is_remote() && !run.records.contains_key(&item.uid))
                .collect();
            if fresh.is_empty() {
                tracing::debug!(page, "Subscription page yielded no new items");
                break;
            }

            let count = fresh.len() as u64;
            run.progress.schedule(
                FetchTask::Subscriptions,
                count,
                format!("Loading subscriptions (page {})", page),
            );

            let ids: Vec<RemoteId> = fresh.iter().filter_map(ModRecord::remote_id).collect();
            run.attempted.extend(ids.iter().copied());

            let requested = ids.as_slice();
            let details = self
                .config
                .retry
                .run("fetch_details", move || catalog.fetch_details(requested))
                .await;

            let mut resolved: BTreeMap<ModUid, ModRecord> =
                fresh.into_iter().map(|r| (r.uid.clone(), r)).collect();
            match details {
                Ok(details) => {
                    for mut detail in details.into_iter().filter(ModRecord::is_remote) {
                        if let Some(listing) = resolved.get(&detail.uid) {
                            detail.state.subscribed |= listing.state.subscribed;
                        }
                        resolved.insert(detail.uid.clone(), detail);
                    }
                }
                Err(e) => {
                    // The listing entries are still usable without details
                    tracing::warn!(page, error = %e, "Detail call for subscription page failed");
                }
            }

            let mut batch: Vec<ModRecord> = resolved.into_values().collect();
            self.resolve_submitters(run, &mut batch).await;
            for record in batch {
                run.insert(record);
            }

            run.progress.advance(
                FetchTask::Subscriptions,
                count,
                format!("Loaded subscriptions (page {})", page),
            );
            page += 1;
        }
    }

    async fn expand_frontier(&self, run: &mut FetchRun, seeds: &BTreeSet<RemoteId>) {
        let catalog = &*self.catalog;
        let chunk_size = self.config.chunk_size.max(1);
        let mut round = 0usize;

        loop {
            let frontier = run.frontier(seeds);
            if frontier.is_empty() {
                break;
            }
            round += 1;
            tracing::debug!(round, size = frontier.len(), "Expanding dependency frontier");

            run.progress.schedule(
                FetchTask::Dependencies,
                frontier.len() as u64,
                format!("Resolving {} dependencies", frontier.len()),
            );

            for (index, chunk) in frontier.chunks(chunk_size).enumerate() {
                run.attempted.extend(chunk.iter().copied());

                let details = self
                    .config
                    .retry
                    .run("fetch_details", move || catalog.fetch_details(chunk))
                    .await;

                let mut batch = match details {
                    Ok(details) => details
                        .into_iter()
                        .filter(ModRecord::is_remote)
                        .collect::<Vec<_>>(),
                    Err(e) => {
                        tracing::warn!(round, chunk = index, error = %e, "Detail call failed, marking chunk invalid");
                        Vec::new()
                    }
                };

                self.resolve_submitters(run, &mut batch).await;
                for record in batch {
                    run.insert(record);
                }

                for id in chunk {
                    if !run.records.contains_key(&ModUid::remote(*id)) {
                        tracing::debug!(remote_id = %id, "Dependency did not resolve, excluding");
                        run.invalid.insert(*id);
                    }
                }

                run.progress.advance(
                    FetchTask::Dependencies,
                    chunk.len() as u64,
                    format!("Resolved dependency chunk {} of round {}", index + 1, round),
                );
            }
        }
    }

    /// Fill in `authors` from submitter ids. Lookups for one batch run
    /// concurrently and each is bounded by the lookup timeout. Failures leave
    /// the record's authors untouched.
    async fn resolve_submitters(&self, run: &mut FetchRun, batch: &mut [ModRecord]) {
        let pending: BTreeSet<u64> = batch
            .iter()
            .filter(|r| r.authors.is_empty())
            .filter_map(|r| r.submitter_id)
            .filter(|id| !run.submitters.contains_key(id))
            .collect();

        if !pending.is_empty() {
            let timeout = self.config.lookup_timeout;
            let lookups = pending.iter().map(|&user_id| async move {
                let result = match tokio::time::timeout(timeout, self.catalog.lookup_submitter(user_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
                };
                (user_id, result)
            });

            for (user_id, result) in join_all(lookups).await {
                match result {
                    Ok(name) => {
                        run.submitters.insert(user_id, name);
                    }
                    Err(e) => {
                        tracing::debug!(user_id, error = %e, "Submitter lookup failed");
                    }
                }
            }
        }

        for record in batch.iter_mut().filter(|r| r.authors.is_empty()) {
            if let Some(name) = record.submitter_id.and_then(|id| run.submitters.get(&id)) {
                record.authors.push(name.clone());
            }
        }
    }
}

/// Mutable state of one `fetch_all` call.
struct FetchRun {
    records: BTreeMap<ModUid, ModRecord>,
    invalid: BTreeSet<RemoteId>,
    attempted: BTreeSet<RemoteId>,
    submitters: HashMap<u64, String>,
    progress: ProgressAggregator,
}

impl FetchRun {
    fn insert(&mut self, record: ModRecord) {
        if let Some(previous) = self.records.insert(record.uid.clone(), record) {
            tracing::debug!(uid = %previous.uid, "Record seen twice, keeping the later one");
        }
    }

    /// Remote ids referenced by seeds or resolved records that are neither
    /// resolved nor attempted yet, in ascending order.
    fn frontier(&self, seeds: &BTreeSet<RemoteId>) -> Vec<RemoteId> {
        let referenced = self
            .records
            .values()
            .flat_map(ModRecord::remote_dependencies)
            .chain(seeds.iter().copied());

        referenced
            .filter(|id| !self.attempted.contains(id) && !self.invalid.contains(id))
            .filter(|id| !self.records.contains_key(&ModUid::remote(*id)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
