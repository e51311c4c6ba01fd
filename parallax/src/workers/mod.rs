//! Worker threads and their pool.

pub mod worker;
pub mod worker_pool;

pub use worker::{Worker, WorkerContext, WorkerEvent, WorkerHandle, WorkerOutcome, WorkerReport};
pub use worker_pool::WorkerPool;
