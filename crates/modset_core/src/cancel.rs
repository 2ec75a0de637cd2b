//! Supersession of in-flight rebuilds and validation passes.
//!
//! Each run takes a [`Ticket`] from a [`Generation`] before it starts. Starting
//! another run bumps the generation, so the older ticket is no longer current
//! and its result must be dropped instead of applied.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Proof that a run was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Monotonic run counter shared by everything that can supersede a run.
#[derive(Debug, Default)]
pub struct Generation {
    current: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, superseding every ticket handed out before.
    pub fn next(&self) -> Ticket {
        Ticket(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current.load(Ordering::Acquire) == ticket.0
    }

    /// `Err(Error::Cancelled)` if a newer run has started since `ticket`.
    pub fn check(&self, ticket: Ticket) -> Result<()> {
        if self.is_current(ticket) {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}

/// Run CPU-bound resolution work off the async runtime.
///
/// A panic inside `f` surfaces as [`Error::Internal`] carrying the panic message.
pub(crate) async fn run_blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_error) => {
            let cause = if join_error.is_panic() {
                let payload = join_error.into_panic();
                payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with non-string payload".to_string())
            } else {
                join_error.to_string()
            };
            Err(Error::Internal(cause))
        }
    }
}
