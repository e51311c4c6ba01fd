//! Actor-learner worker thread.
//!
//! Each worker loops: check the stop token and the global counter, run one
//! bounded unit of work from its learner, apply the resulting gradient to
//! the shared store, and advance the counter by the unit's step delta.
//! Workers never block on each other; only the shared-state mutations
//! themselves serialize. Termination is cooperative: the loop exits at
//! iteration boundaries only, so a unit is either fully applied or not
//! applied at all.
//!
//! # Failure policy
//!
//! A failed unit of work (an `Err` from the learner, or a gradient the
//! store rejects) terminates that worker alone: nothing from the failed
//! unit is applied, the failure is reported on the event channel and
//! logged, and the remaining workers keep running. A panic in a worker
//! thread is surfaced at join time by the orchestrator.

use crossbeam_channel::Sender;
use log::{error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::param_store::SharedParamStore;
use crate::core::run_clock::RunClock;
use crate::core::step_counter::SharedStepCounter;
use crate::core::stop_token::StopToken;
use crate::learner::{Learner, WorkError};
use crate::optim::GradientApplier;

/// How often a worker pushes a progress event, in completed units.
const PROGRESS_EVERY_UNITS: u64 = 8;

/// Immutable per-worker identity plus clock bookkeeping.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Worker index in `0..parallelism`.
    pub index: usize,
    /// Assigned initial learning rate.
    pub learning_rate: f64,
    /// Lineage clock; continues prior runs' training time.
    pub clock: RunClock,
}

impl WorkerContext {
    /// Create a context for the given worker.
    pub fn new(index: usize, learning_rate: f64, clock: RunClock) -> Self {
        Self {
            index,
            learning_rate,
            clock,
        }
    }
}

/// Why a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The stop token was set.
    StopRequested,
    /// The global counter exceeded the step budget.
    BudgetExhausted,
    /// A unit of work failed; nothing from it was applied.
    Failed,
}

/// Final accounting a worker thread returns at join.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker index.
    pub index: usize,
    /// Why the loop ended.
    pub outcome: WorkerOutcome,
    /// Exact steps this worker contributed to the global counter.
    pub steps_contributed: u64,
    /// Units of work completed.
    pub units_completed: u64,
    /// Most recent score the learner reported.
    pub last_score: Option<f32>,
    /// Lineage training time observed at termination: prior runs'
    /// duration plus this worker's own running time.
    pub elapsed: Duration,
}

/// Periodic event pushed while a worker runs.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Progress since the last event.
    Progress {
        /// Worker index.
        index: usize,
        /// Steps contributed so far.
        steps_contributed: u64,
        /// Units completed so far.
        units_completed: u64,
        /// Most recent score, if any.
        score: Option<f32>,
    },
    /// The worker's unit of work failed and the worker is terminating.
    Failure {
        /// Worker index.
        index: usize,
        /// What went wrong.
        message: String,
    },
}

/// Handle for a spawned worker thread.
pub struct WorkerHandle {
    index: usize,
    thread: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Worker index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the worker thread exits.
    pub fn join(self) -> thread::Result<WorkerReport> {
        self.thread.join()
    }
}

/// One actor-learner worker.
pub struct Worker {
    ctx: WorkerContext,
}

impl Worker {
    /// Create a worker with the given context.
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Spawn the worker loop on its own named thread.
    ///
    /// The loop runs until the stop token is set, the counter exceeds
    /// `step_budget` (strict-greater: the final total may overshoot the
    /// budget by in-flight units), or a unit of work fails.
    pub fn spawn<L>(
        self,
        mut learner: L,
        applier: Arc<dyn GradientApplier>,
        store: SharedParamStore,
        counter: SharedStepCounter,
        stop: StopToken,
        step_budget: u64,
        events_tx: Sender<WorkerEvent>,
    ) -> WorkerHandle
    where
        L: Learner + 'static,
    {
        let ctx = self.ctx;
        let index = ctx.index;

        let thread = thread::Builder::new()
            .name(format!("worker-{}", index))
            .spawn(move || {
                // Entry into Running: anchor local time bookkeeping at the
                // lineage's effective start (run start minus prior
                // training time), so elapsed readings span the lineage.
                let start_offset = ctx.clock.start_offset();

                let mut steps_contributed = 0u64;
                let mut units_completed = 0u64;
                let mut last_score: Option<f32> = None;

                let outcome = loop {
                    if stop.is_stopped() {
                        break WorkerOutcome::StopRequested;
                    }
                    if counter.current() > step_budget {
                        break WorkerOutcome::BudgetExhausted;
                    }

                    let snapshot = store.snapshot();
                    let unit = match learner.unit_of_work(&snapshot, ctx.learning_rate) {
                        Ok(unit) => unit,
                        Err(err) => {
                            break Self::fail(index, &events_tx, err);
                        }
                    };

                    if let Err(err) =
                        store.apply_update(applier.as_ref(), &unit.gradients, ctx.learning_rate)
                    {
                        break Self::fail(index, &events_tx, WorkError::Model(err.to_string()));
                    }
                    counter.advance(unit.step_delta);

                    steps_contributed += unit.step_delta;
                    units_completed += 1;
                    if unit.score.is_some() {
                        last_score = unit.score;
                    }

                    if units_completed % PROGRESS_EVERY_UNITS == 0 {
                        // A full channel drops the event rather than
                        // stalling the worker.
                        let _ = events_tx.try_send(WorkerEvent::Progress {
                            index,
                            steps_contributed,
                            units_completed,
                            score: last_score,
                        });
                    }
                };

                let _ = events_tx.try_send(WorkerEvent::Progress {
                    index,
                    steps_contributed,
                    units_completed,
                    score: last_score,
                });

                WorkerReport {
                    index,
                    outcome,
                    steps_contributed,
                    units_completed,
                    last_score,
                    elapsed: start_offset.elapsed(),
                }
            })
            .expect("failed to spawn worker thread");

        WorkerHandle { index, thread }
    }

    fn fail(index: usize, events_tx: &Sender<WorkerEvent>, err: WorkError) -> WorkerOutcome {
        error!("worker {} unit of work failed: {}", index, err);
        if events_tx
            .try_send(WorkerEvent::Failure {
                index,
                message: err.to_string(),
            })
            .is_err()
        {
            warn!("worker {} failure event dropped (channel full)", index);
        }
        WorkerOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::param_store::param_store;
    use crate::core::step_counter::step_counter;
    use crate::learner::WorkUnit;
    use crate::optim::SgdApplier;
    use std::time::Duration;

    /// Learner that contributes a fixed delta per unit.
    struct FixedDeltaLearner {
        delta: u64,
        pause: Option<Duration>,
    }

    impl Learner for FixedDeltaLearner {
        fn unit_of_work(&mut self, params: &[f32], _lr: f64) -> Result<WorkUnit, WorkError> {
            if let Some(pause) = self.pause {
                thread::sleep(pause);
            }
            Ok(WorkUnit::new(vec![0.0; params.len()], self.delta).with_score(1.0))
        }
    }

    /// Learner that fails after a number of good units.
    struct FlakyLearner {
        good_units: usize,
    }

    impl Learner for FlakyLearner {
        fn unit_of_work(&mut self, params: &[f32], _lr: f64) -> Result<WorkUnit, WorkError> {
            if self.good_units == 0 {
                return Err(WorkError::Environment("simulator died".into()));
            }
            self.good_units -= 1;
            Ok(WorkUnit::new(vec![0.0; params.len()], 5))
        }
    }

    fn spawn_fixed(
        delta: u64,
        pause: Option<Duration>,
        store: SharedParamStore,
        counter: SharedStepCounter,
        stop: StopToken,
        budget: u64,
    ) -> WorkerHandle {
        let (tx, _rx) = crossbeam_channel::bounded(64);
        Worker::new(WorkerContext::new(0, 1e-3, RunClock::fresh())).spawn(
            FixedDeltaLearner { delta, pause },
            Arc::new(SgdApplier),
            store,
            counter,
            stop,
            budget,
            tx,
        )
    }

    #[test]
    fn test_runs_until_budget_exhausted() {
        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let stop = StopToken::new();

        let handle = spawn_fixed(10, None, store, Arc::clone(&counter), stop, 100);
        let report = handle.join().unwrap();

        assert_eq!(report.outcome, WorkerOutcome::BudgetExhausted);
        // Strict-greater exit: the counter ends above the budget.
        assert!(counter.current() > 100);
        assert_eq!(report.steps_contributed, counter.current());
        assert_eq!(report.units_completed * 10, report.steps_contributed);
    }

    #[test]
    fn test_stop_token_terminates_within_one_unit() {
        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let stop = StopToken::new();

        let handle = spawn_fixed(
            1,
            Some(Duration::from_millis(5)),
            store,
            Arc::clone(&counter),
            stop.clone(),
            u64::MAX - 1,
        );

        thread::sleep(Duration::from_millis(20));
        stop.request_stop();
        let report = handle.join().unwrap();

        assert_eq!(report.outcome, WorkerOutcome::StopRequested);

        // No mutation after the join barrier.
        let frozen = counter.current();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.current(), frozen);
    }

    #[test]
    fn test_stop_before_start_means_no_work() {
        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let stop = StopToken::new();
        stop.request_stop();

        let handle = spawn_fixed(10, None, Arc::clone(&store), Arc::clone(&counter), stop, 100);
        let report = handle.join().unwrap();

        assert_eq!(report.outcome, WorkerOutcome::StopRequested);
        assert_eq!(report.steps_contributed, 0);
        assert_eq!(counter.current(), 0);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_report_elapsed_continues_the_lineage() {
        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let (tx, _rx) = crossbeam_channel::bounded(64);

        let prior = Duration::from_secs(1);
        let handle = Worker::new(WorkerContext::new(0, 1e-3, RunClock::resumed(prior))).spawn(
            FixedDeltaLearner {
                delta: 10,
                pause: Some(Duration::from_millis(5)),
            },
            Arc::new(SgdApplier),
            store,
            counter,
            StopToken::new(),
            20,
            tx,
        );
        let report = handle.join().unwrap();

        // Local bookkeeping is anchored at the lineage's effective start,
        // so elapsed continues from the prior runs' total.
        assert!(report.elapsed >= prior);
        assert!(report.elapsed < prior + Duration::from_secs(5));
    }

    #[test]
    fn test_failed_unit_is_isolated_and_unapplied() {
        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let stop = StopToken::new();
        let (tx, rx) = crossbeam_channel::bounded(64);

        let handle = Worker::new(WorkerContext::new(3, 1e-3, RunClock::fresh())).spawn(
            FlakyLearner { good_units: 2 },
            Arc::new(SgdApplier),
            Arc::clone(&store),
            Arc::clone(&counter),
            stop,
            u64::MAX - 1,
            tx,
        );
        let report = handle.join().unwrap();

        assert_eq!(report.outcome, WorkerOutcome::Failed);
        assert_eq!(report.units_completed, 2);
        // Only the good units counted; the failed one applied nothing.
        assert_eq!(counter.current(), 10);
        assert_eq!(store.generation(), 2);

        let failure = rx
            .try_iter()
            .find(|ev| matches!(ev, WorkerEvent::Failure { .. }))
            .expect("failure event not reported");
        match failure {
            WorkerEvent::Failure { index, message } => {
                assert_eq!(index, 3);
                assert!(message.contains("simulator died"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_gradient_length_mismatch_fails_the_worker() {
        struct WrongShapeLearner;
        impl Learner for WrongShapeLearner {
            fn unit_of_work(&mut self, _p: &[f32], _lr: f64) -> Result<WorkUnit, WorkError> {
                Ok(WorkUnit::new(vec![0.0; 2], 5))
            }
        }

        let store = param_store(vec![0.0; 4]);
        let counter = step_counter(0);
        let (tx, _rx) = crossbeam_channel::bounded(64);

        let handle = Worker::new(WorkerContext::new(0, 1e-3, RunClock::fresh())).spawn(
            WrongShapeLearner,
            Arc::new(SgdApplier),
            Arc::clone(&store),
            Arc::clone(&counter),
            StopToken::new(),
            1000,
            tx,
        );
        let report = handle.join().unwrap();

        assert_eq!(report.outcome, WorkerOutcome::Failed);
        assert_eq!(counter.current(), 0);
        assert_eq!(store.generation(), 0);
    }
}
