//! In-flight work tracking.
//!
//! # Responsibilities
//! - Count units of work (requests, jobs) that must finish before exit
//! - Give each unit an ID for tracing
//! - Let the shutdown body wait until the count reaches zero
//!
//! # Design Decisions
//! - RAII guards: work is finished when its guard drops, even on panic
//! - The count lives in a watch channel so waiters wake on change instead
//!   of polling

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Global atomic counter for work IDs.
static WORK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(u64);

impl WorkId {
    /// Generate a new unique work ID.
    pub fn new() -> Self {
        Self(WORK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "work-{}", self.0)
    }
}

/// Tracks in-flight work for graceful shutdown.
#[derive(Debug, Clone)]
pub struct WorkTracker {
    active: Arc<watch::Sender<u64>>,
}

impl WorkTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new unit of work. Returns a guard that finishes it on drop.
    pub fn track(&self) -> WorkGuard {
        self.active.send_modify(|n| *n += 1);
        WorkGuard {
            active: Arc::clone(&self.active),
            id: WorkId::new(),
        }
    }

    /// Get current in-flight count.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until no work is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for WorkTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks one unit of work.
#[derive(Debug)]
pub struct WorkGuard {
    active: Arc<watch::Sender<u64>>,
    id: WorkId,
}

impl WorkGuard {
    /// Get this unit's ID.
    pub fn id(&self) -> WorkId {
        self.id
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n -= 1);
        tracing::trace!(work_id = %self.id, "Work finished");
    }
}
