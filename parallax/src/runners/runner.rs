//! Orchestrator: builds the shared state, spawns the workers, waits for the
//! stop condition, joins, and checkpoints.
//!
//! The run sequence is fixed:
//!
//! 1. Compute per-worker learning rates from the configured range.
//! 2. Construct the shared store, counter, stop token, and lineage clock.
//! 3. Restore the latest checkpoint (unless `start_fresh` is set); the
//!    parameters, counter value, and prior wall time come back as one
//!    matched triple. Corruption aborts startup.
//! 4. Spawn one worker thread per configured degree.
//! 5. Wait until a stop is requested or every worker exits on its own,
//!    draining worker events and logging periodic snapshots.
//! 6. Join all workers; after this barrier no concurrent writer exists.
//! 7. Persist the {parameters, counter, wall time} triple, tagged with the
//!    counter value. A failed save is a fatal error, not a warning.
//!
//! # Overshoot policy
//!
//! Workers compare the counter to the budget with a strict-greater check at
//! iteration boundaries, without synchronizing against each other's
//! increments. The final counter therefore exceeds the budget by up to the
//! sum of the units in flight when the boundary was crossed. This is
//! accepted: the budget is a floor for "enough training", not a cap.

use crossbeam_channel::bounded;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::checkpoint::{
    CheckpointError, Checkpointer, CheckpointerConfig, SavedCheckpoint,
};
use crate::config::{ConfigError, TrainConfig};
use crate::core::param_store::{param_store, StoreError};
use crate::core::run_clock::RunClock;
use crate::core::step_counter::step_counter;
use crate::core::stop_token::StopToken;
use crate::learner::Learner;
use crate::metrics::{MetricsLogger, RunSnapshot};
use crate::optim::GradientApplier;
use crate::scheduling::log_uniform_rates;
use crate::workers::{Worker, WorkerContext, WorkerEvent, WorkerPool, WorkerReport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Error from a training run.
#[derive(Debug)]
pub enum TrainError {
    /// Invalid configuration, rejected before any worker started.
    Config(ConfigError),
    /// Checkpoint restore or save failed.
    Checkpoint(CheckpointError),
    /// Restored parameter blob was rejected by the store.
    Store(StoreError),
    /// A worker thread panicked; its contribution up to the panic is in the
    /// counter, and the final checkpoint was still written.
    WorkerPanicked { index: usize },
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::Config(e) => write!(f, "invalid configuration: {}", e),
            TrainError::Checkpoint(e) => write!(f, "checkpoint error: {}", e),
            TrainError::Store(e) => write!(f, "parameter store error: {}", e),
            TrainError::WorkerPanicked { index } => {
                write!(f, "worker {} panicked", index)
            }
        }
    }
}

impl std::error::Error for TrainError {}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        TrainError::Config(e)
    }
}

impl From<CheckpointError> for TrainError {
    fn from(e: CheckpointError) -> Self {
        TrainError::Checkpoint(e)
    }
}

impl From<StoreError> for TrainError {
    fn from(e: StoreError) -> Self {
        TrainError::Store(e)
    }
}

/// Final accounting for a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Progress counter at shutdown.
    pub final_step: u64,
    /// Cumulative training wall time for the lineage.
    pub wall_time: Duration,
    /// Counter value this run resumed from, if it restored a checkpoint.
    pub resumed_from: Option<u64>,
    /// The checkpoint pair written at shutdown.
    pub checkpoint: SavedCheckpoint,
    /// Per-worker final reports, in index order.
    pub reports: Vec<WorkerReport>,
}

/// Training orchestrator.
#[derive(Debug)]
pub struct Runner {
    config: TrainConfig,
    stop: StopToken,
}

impl Runner {
    /// Create a runner, validating the configuration up front.
    pub fn new(config: TrainConfig) -> Result<Self, TrainError> {
        config.validate()?;
        Ok(Self {
            config,
            stop: StopToken::new(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Handle for requesting a graceful stop from any thread or a signal
    /// handler. Requests are idempotent.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Execute one training run to completion.
    ///
    /// `initial_params` seeds the store for a fresh lineage; a restored
    /// checkpoint replaces it entirely. An empty seed is invalid
    /// configuration and is rejected before any thread starts.
    /// `learner_factory` is called once per worker with that worker's
    /// context.
    ///
    /// A runner whose stop token was set stays stopped; build a new runner
    /// for a subsequent run.
    pub fn run<F, L>(
        &self,
        initial_params: Vec<f32>,
        applier: Arc<dyn GradientApplier>,
        mut learner_factory: F,
        logger: &mut dyn MetricsLogger,
    ) -> Result<RunSummary, TrainError>
    where
        F: FnMut(&WorkerContext) -> L,
        L: Learner + 'static,
    {
        if initial_params.is_empty() {
            return Err(ConfigError::EmptyParameterSet.into());
        }

        let rates = log_uniform_rates(
            self.config.rate_low,
            self.config.rate_high,
            self.config.parallelism,
        )?;

        let checkpointer = Checkpointer::new(
            CheckpointerConfig::new(&self.config.checkpoint_dir)
                .with_keep_last_n(self.config.keep_last_n),
        )?;

        let restored = if self.config.start_fresh {
            info!("start-fresh override set; ignoring any existing checkpoints");
            None
        } else {
            checkpointer.restore_latest()?
        };

        let store = param_store(initial_params);
        let resumed_from = restored.as_ref().map(|record| record.step);
        let (initial_step, prior_wall) = match &restored {
            Some(record) => {
                store.restore_from_bytes(&record.params)?;
                (record.step, record.wall_time)
            }
            None => (0, Duration::ZERO),
        };
        let counter = step_counter(initial_step);

        // Execution begins here; the clock anchors the lineage's wall time
        // to this instant.
        let clock = RunClock::resumed(prior_wall);

        let (events_tx, events_rx) = bounded::<WorkerEvent>(EVENT_CHANNEL_CAPACITY);
        let mut pool = WorkerPool::with_capacity(self.config.parallelism);
        for (index, &rate) in rates.iter().enumerate() {
            let ctx = WorkerContext::new(index, rate, clock.clone());
            let learner = learner_factory(&ctx);
            pool.push(Worker::new(ctx).spawn(
                learner,
                Arc::clone(&applier),
                Arc::clone(&store),
                Arc::clone(&counter),
                self.stop.clone(),
                self.config.step_budget,
                events_tx.clone(),
            ));
        }
        drop(events_tx);
        info!(
            "spawned {} workers (step budget {}, resuming from step {})",
            pool.len(),
            self.config.step_budget,
            initial_step
        );

        let mut units_per_worker = vec![0u64; self.config.parallelism];
        let mut last_score: Option<f32> = None;
        let mut last_log = Instant::now();
        loop {
            while let Ok(event) = events_rx.try_recv() {
                match event {
                    WorkerEvent::Progress {
                        index,
                        units_completed,
                        score,
                        ..
                    } => {
                        units_per_worker[index] = units_completed;
                        if score.is_some() {
                            last_score = score;
                        }
                    }
                    WorkerEvent::Failure { index, message } => {
                        warn!("worker {} failed and terminated: {}", index, message);
                    }
                }
            }

            if self.stop.is_stopped() {
                info!("stop requested; waiting for workers to finish their current unit");
                break;
            }
            if pool.all_finished() {
                debug!("all workers exited on their own");
                break;
            }

            if last_log.elapsed().as_secs_f32() >= self.config.log_interval_secs {
                let elapsed = clock.elapsed_secs();
                let step = counter.current();
                logger.log(
                    &RunSnapshot::new(step)
                        .with_progress(units_per_worker.iter().sum(), pool.running_count())
                        .with_score(last_score)
                        .with_timing(elapsed, step as f64 / elapsed.max(f64::EPSILON)),
                );
                last_log = Instant::now();
            }

            thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
        }
        // Covers the exited-on-their-own path; idempotent otherwise.
        self.stop.request_stop();

        // Join barrier: past this point no worker mutates shared state.
        let mut reports = Vec::with_capacity(self.config.parallelism);
        let mut panicked = None;
        for (index, result) in pool.join_all() {
            match result {
                Ok(report) => reports.push(report),
                Err(_) => {
                    error!("worker {} panicked", index);
                    panicked = Some(index);
                }
            }
        }

        let final_step = counter.current();
        let wall_time = clock.elapsed();
        let blob = store.to_bytes();
        let checkpoint = checkpointer.save(&blob, final_step, wall_time)?;

        let units_total: u64 = reports.iter().map(|r| r.units_completed).sum();
        logger.log(
            &RunSnapshot::new(final_step)
                .with_progress(units_total, 0)
                .with_score(reports.iter().rev().find_map(|r| r.last_score))
                .with_timing(
                    wall_time.as_secs_f64(),
                    final_step as f64 / wall_time.as_secs_f64().max(f64::EPSILON),
                ),
        );
        logger.flush();

        if let Some(index) = panicked {
            return Err(TrainError::WorkerPanicked { index });
        }

        info!(
            "run complete: step {}, wall time {:.1}s, checkpoint {}",
            final_step,
            wall_time.as_secs_f64(),
            checkpoint.blob_path.display()
        );

        Ok(RunSummary {
            final_step,
            wall_time,
            resumed_from,
            checkpoint,
            reports,
        })
    }
}
