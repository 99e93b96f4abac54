//! Per-operation cancellation.
//!
//! Every store operation takes an [`OpContext`]. Cancelling it, or passing its
//! deadline, aborts that operation only: while it waits for the connection, or
//! inside a running statement through SQLite's progress handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag plus optional deadline for one operation.
///
/// Clones share the flag, so a clone handed to another thread can cancel the
/// operation running with the original.
///
/// # Example
///
/// ```
/// use pipestore::context::OpContext;
/// use std::time::Duration;
///
/// let ctx = OpContext::with_timeout(Duration::from_secs(5));
/// let canceller = ctx.clone();
/// assert!(!ctx.is_done());
/// canceller.cancel();
/// assert!(ctx.is_done());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context that is only done once cancelled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        OpContext {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The error SQLite reports for an interrupted statement, for aborts that
    /// happen before a statement runs
    pub(crate) fn interrupted(&self, detail: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            Some(detail.to_string()),
        )
    }
}
