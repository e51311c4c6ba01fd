//! # Parallax: asynchronous actor-learner training core
//!
//! Coordinates N worker threads that concurrently compute gradient updates
//! against one shared parameter set, with exact global step accounting,
//! cooperative cancellation, and resumable checkpoints.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Runner                               │
//! ├────────────────────────────────────────────────────────────────┤
//! │  Thread 1          Thread 2          Thread N                  │
//! │  ┌────────┐        ┌────────┐        ┌────────┐               │
//! │  │Worker 0│        │Worker 1│        │Worker N│               │
//! │  │learner │        │learner │        │learner │               │
//! │  └───┬────┘        └───┬────┘        └───┬────┘               │
//! │      │                 │                 │                     │
//! │      └────────┬────────┴────────┬────────┘                     │
//! │               ▼                 ▼                              │
//! │        ┌────────────┐    ┌─────────────┐    ┌────────────┐   │
//! │        │ ParamStore │    │ StepCounter │    │ StopToken  │   │
//! │        │ (RwLock)   │    │ (atomic)    │    │ (atomic)   │   │
//! │        └─────┬──────┘    └──────┬──────┘    └────────────┘   │
//! │              └────────┬────────┘                              │
//! │                       ▼                                       │
//! │               ┌──────────────┐                                │
//! │               │ Checkpointer │  blob + sidecar, tagged by     │
//! │               │              │  the counter value             │
//! │               └──────────────┘                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never block on each other; only the two shared resources
//! (parameters, counter) synchronize internally. The counter's final value
//! is the exact sum of every worker's deltas; the parameter state is some
//! serialization of all applied updates. Cancellation is a shared token
//! observed at iteration boundaries, and the shutdown checkpoint is taken
//! strictly after the join barrier.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parallax::{Runner, TrainConfig, SgdApplier, ConsoleLogger};
//! use std::sync::Arc;
//!
//! let config = TrainConfig::new()
//!     .with_parallelism(8)
//!     .with_step_budget(1_000_000)
//!     .with_checkpoint_dir("./checkpoints");
//!
//! let runner = Runner::new(config)?;
//! let summary = runner.run(
//!     initial_params,
//!     Arc::new(SgdApplier),
//!     |ctx| MyLearner::new(ctx.index, ctx.learning_rate),
//!     &mut ConsoleLogger::new(),
//! )?;
//! ```

pub mod checkpoint;
pub mod config;
pub mod core;
pub mod environment;
pub mod learner;
pub mod metrics;
pub mod optim;
pub mod runners;
pub mod scheduling;
pub mod workers;

// Shared state primitives
pub use crate::core::param_store::{param_store, ParamStore, SharedParamStore, StoreError};
pub use crate::core::run_clock::RunClock;
pub use crate::core::step_counter::{step_counter, SharedStepCounter, StepCounter};
pub use crate::core::stop_token::StopToken;

// Configuration
pub use config::{ConfigError, TrainConfig};

// Collaborator interfaces
pub use environment::{Environment, StepOutcome};
pub use learner::{Learner, WorkError, WorkUnit};
pub use optim::{GradientApplier, RmsPropApplier, SgdApplier};

// Learning-rate assignment
pub use scheduling::log_uniform_rates;

// Workers
pub use workers::{Worker, WorkerContext, WorkerEvent, WorkerHandle, WorkerOutcome, WorkerReport};

// Checkpointing
pub use checkpoint::{
    CheckpointError, CheckpointMeta, CheckpointRecord, Checkpointer, CheckpointerConfig,
    SavedCheckpoint,
};

// Telemetry
pub use metrics::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, NullLogger, RunSnapshot};

// Orchestration
pub use runners::{RunSummary, Runner, TrainError};
