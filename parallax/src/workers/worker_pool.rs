//! Pool of worker handles with a structured join barrier.
//!
//! `join_all` is the synchronization point the checkpoint step relies on:
//! once it returns, no worker thread exists, so no concurrent writer can
//! touch the parameter store or the step counter.

use super::worker::{WorkerHandle, WorkerReport};
use std::thread;

/// All spawned worker handles for one run.
pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Create an empty pool with room for `capacity` workers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handles: Vec::with_capacity(capacity),
        }
    }

    /// Add a spawned worker.
    pub fn push(&mut self, handle: WorkerHandle) {
        self.handles.push(handle);
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether every worker thread has exited on its own.
    pub fn all_finished(&self) -> bool {
        self.handles.iter().all(WorkerHandle::is_finished)
    }

    /// Number of workers still running.
    pub fn running_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Join every worker, in index order.
    ///
    /// Blocks until all threads have fully exited. Each entry is the
    /// worker's final report, or the panic payload if its thread panicked.
    pub fn join_all(self) -> Vec<(usize, thread::Result<WorkerReport>)> {
        self.handles
            .into_iter()
            .map(|handle| {
                let index = handle.index();
                (index, handle.join())
            })
            .collect()
    }
}
