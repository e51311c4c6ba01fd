//! Global progress counter shared by all workers.
//!
//! Counts cumulative environment-interaction steps across the whole run.
//! Increments are exact under concurrency: the final total after all workers
//! stop equals the sum of every delta ever applied, regardless of
//! interleaving. Reads are allowed to lag by in-flight increments; they are
//! only used to decide whether a worker should keep looping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically non-decreasing step counter.
#[derive(Debug)]
pub struct StepCounter {
    total: AtomicU64,
}

impl StepCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::with_initial(0)
    }

    /// Create a counter starting at a restored value.
    pub fn with_initial(initial: u64) -> Self {
        Self {
            total: AtomicU64::new(initial),
        }
    }

    /// Add `delta` steps and return the new total.
    pub fn advance(&self, delta: u64) -> u64 {
        self.total.fetch_add(delta, Ordering::Relaxed) + delta
    }

    /// Current total.
    ///
    /// May be stale by concurrent in-flight `advance` calls.
    pub fn current(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared step counter.
pub type SharedStepCounter = Arc<StepCounter>;

/// Create a new shared step counter starting at `initial`.
pub fn step_counter(initial: u64) -> SharedStepCounter {
    Arc::new(StepCounter::with_initial(initial))
}
