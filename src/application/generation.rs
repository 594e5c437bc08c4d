//! Reset generations: how a chat worker tells stale work from current work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of a chat's generation taken when a unit of work started.
///
/// The dispatcher bumps the shared counter the moment a reset is requested,
/// before the reset reaches the worker's queue, so results computed for the
/// old session can be recognised and dropped.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    counter: Arc<AtomicU64>,
    seen: u64,
}

impl GenerationToken {
    pub fn new(counter: Arc<AtomicU64>) -> Self {
        let seen = counter.load(Ordering::SeqCst);
        Self { counter, seen }
    }

    /// A token for work that can never go stale.
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)))
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.seen
    }
}
