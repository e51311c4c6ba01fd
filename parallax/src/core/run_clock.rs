//! Wall-clock accounting that survives checkpoint/restore.
//!
//! Training duration is distinct from process uptime: a resumed run must
//! report time that continues from where the prior run left off, without
//! counting the idle gap between runs. The clock therefore anchors at the
//! moment this run's execution begins and carries the prior runs' persisted
//! duration as a fixed offset.

use std::time::{Duration, Instant};

/// Elapsed training time for a checkpoint lineage.
///
/// `elapsed()` returns `now - started + prior`, i.e. the time this run has
/// been training plus everything the lineage accumulated before it.
#[derive(Debug, Clone)]
pub struct RunClock {
    started: Instant,
    prior: Duration,
}

impl RunClock {
    /// Start a clock for a fresh lineage (no prior training time).
    pub fn fresh() -> Self {
        Self::resumed(Duration::ZERO)
    }

    /// Start a clock continuing a lineage that already trained for `prior`.
    pub fn resumed(prior: Duration) -> Self {
        Self {
            started: Instant::now(),
            prior,
        }
    }

    /// Training time carried over from prior runs.
    pub fn prior(&self) -> Duration {
        self.prior
    }

    /// Effective start of the lineage: this run's start instant shifted
    /// back by the prior runs' duration, so elapsed time measured from it
    /// spans the whole lineage. Workers anchor their local bookkeeping on
    /// this value when they enter their loop.
    ///
    /// Falls back to the unshifted run start when the platform clock
    /// cannot represent an instant that far in the past (prior training
    /// time exceeding system uptime).
    pub fn start_offset(&self) -> Instant {
        self.started.checked_sub(self.prior).unwrap_or(self.started)
    }

    /// Cumulative training time across the lineage, as of now.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed() + self.prior
    }

    /// Cumulative training time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}
