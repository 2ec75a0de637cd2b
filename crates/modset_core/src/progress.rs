//! Load progress reporting for the dependency fetcher.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Which part of a load cycle a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchTask {
    /// Scanning local and legacy mod folders.
    LocalScan,
    /// Paging through the remote subscription listing.
    Subscriptions,
    /// Expanding the dependency frontier.
    Dependencies,
    /// The load cycle finished.
    Complete,
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchProgress {
    pub task: FetchTask,
    /// Fraction in `[0.0, 1.0]`. Exactly `1.0` only on the final event.
    pub fraction: f64,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(FetchProgress) + Send + Sync>;

/// Largest fraction reported before [`ProgressAggregator::finish`].
const MAX_PENDING_FRACTION: f64 = 0.99;

#[derive(Debug, Default)]
struct Counters {
    processed: u64,
    total: u64,
    last: Option<f64>,
    finished: bool,
}

/// Serializes `processed / total` updates and their notifications.
///
/// Every update increments a counter, recomputes the fraction and notifies the
/// callback while holding one lock, so concurrent chunks can never emit
/// out-of-order or duplicated fractions. The callback must not call back into
/// the aggregator.
pub struct ProgressAggregator {
    counters: Mutex<Counters>,
    callback: Option<ProgressCallback>,
}

impl ProgressAggregator {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            callback,
        }
    }

    /// A newly scheduled batch of `count` items grows the denominator.
    pub fn schedule(&self, task: FetchTask, count: u64, message: impl Into<String>) {
        self.update(task, message.into(), |c| c.total += count);
    }

    /// `count` items were processed, whether or not they resolved.
    pub fn advance(&self, task: FetchTask, count: u64, message: impl Into<String>) {
        self.update(task, message.into(), |c| {
            c.processed += count;
            // Never report more done than scheduled
            c.total = c.total.max(c.processed);
        });
    }

    /// Emit the single completion event. Later calls are ignored.
    pub fn finish(&self, message: impl Into<String>) {
        let mut counters = self.lock();
        if counters.finished {
            return;
        }
        counters.finished = true;
        counters.last = Some(1.0);
        self.notify(FetchTask::Complete, 1.0, message.into());
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn update(&self, task: FetchTask, message: String, mutate: impl FnOnce(&mut Counters)) {
        let mut counters = self.lock();
        if counters.finished {
            tracing::warn!(?task, "Progress update after completion ignored");
            return;
        }
        mutate(&mut counters);

        let computed = if counters.total == 0 {
            0.0
        } else {
            (counters.processed as f64 / counters.total as f64).min(MAX_PENDING_FRACTION)
        };

        let fraction = match counters.last {
            Some(last) if computed <= last => return,
            _ => computed,
        };
        counters.last = Some(fraction);
        self.notify(task, fraction, message);
    }

    fn notify(&self, task: FetchTask, fraction: f64, message: String) {
        if let Some(callback) = &self.callback {
            callback(FetchProgress {
                task,
                fraction,
                message,
            });
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("counters", &*self.lock())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
