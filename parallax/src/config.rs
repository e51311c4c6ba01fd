//! Run configuration and fail-fast validation.
//!
//! Invalid configuration is rejected before any worker thread starts.
//! Nothing here is silently substituted with a default: a caller that asks
//! for zero workers or a non-positive rate bound gets an error, not a guess.

use std::fmt;
use std::path::PathBuf;

/// Configuration rejected at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Parallelism degree of zero.
    ZeroParallelism,
    /// Step budget of zero.
    ZeroStepBudget,
    /// A learning-rate bound that is not a positive finite number.
    NonPositiveRate(f64),
    /// Rate range with `low > high`.
    InvertedRateRange { low: f64, high: f64 },
    /// An empty initial parameter set.
    EmptyParameterSet,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroParallelism => {
                write!(f, "parallelism degree must be at least 1")
            }
            ConfigError::ZeroStepBudget => {
                write!(f, "step budget must be at least 1")
            }
            ConfigError::NonPositiveRate(rate) => {
                write!(f, "learning-rate bound must be positive and finite, got {}", rate)
            }
            ConfigError::InvertedRateRange { low, high } => {
                write!(f, "learning-rate range is inverted: low {} > high {}", low, high)
            }
            ConfigError::EmptyParameterSet => {
                write!(f, "initial parameter set must not be empty")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for a training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of worker threads.
    pub parallelism: usize,
    /// Global step budget: workers loop until the counter exceeds this.
    pub step_budget: u64,
    /// Low bound of the per-worker initial learning-rate range.
    pub rate_low: f64,
    /// High bound of the per-worker initial learning-rate range.
    pub rate_high: f64,
    /// Directory holding checkpoint blobs and sidecar records.
    pub checkpoint_dir: PathBuf,
    /// Skip checkpoint restore and start a fresh lineage.
    ///
    /// This is the only way to ignore an existing checkpoint; a corrupt or
    /// present checkpoint is never bypassed implicitly.
    pub start_fresh: bool,
    /// Matched checkpoint pairs to retain (0 = keep all).
    pub keep_last_n: usize,
    /// Seconds between progress snapshots.
    pub log_interval_secs: f32,
    /// Milliseconds the orchestrator sleeps between polls of worker state.
    pub poll_interval_ms: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            step_budget: 10_000_000,
            rate_low: 1e-4,
            rate_high: 5e-3,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            start_fresh: false,
            keep_last_n: 5,
            log_interval_secs: 5.0,
            poll_interval_ms: 100,
        }
    }
}

impl TrainConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the global step budget.
    pub fn with_step_budget(mut self, step_budget: u64) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Set the initial learning-rate range.
    pub fn with_rate_range(mut self, low: f64, high: f64) -> Self {
        self.rate_low = low;
        self.rate_high = high;
        self
    }

    /// Set the checkpoint directory.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Skip restore and start a fresh lineage.
    pub fn with_start_fresh(mut self, start_fresh: bool) -> Self {
        self.start_fresh = start_fresh;
        self
    }

    /// Set how many matched checkpoint pairs to retain.
    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }

    /// Set the snapshot logging interval.
    pub fn with_log_interval_secs(mut self, secs: f32) -> Self {
        self.log_interval_secs = secs;
        self
    }

    /// Set the orchestrator poll interval.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        if self.step_budget == 0 {
            return Err(ConfigError::ZeroStepBudget);
        }
        for &bound in [self.rate_low, self.rate_high].iter() {
            if !(bound.is_finite() && bound > 0.0) {
                return Err(ConfigError::NonPositiveRate(bound));
            }
        }
        if self.rate_low > self.rate_high {
            return Err(ConfigError::InvertedRateRange {
                low: self.rate_low,
                high: self.rate_high,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = TrainConfig::new()
            .with_parallelism(8)
            .with_step_budget(1000)
            .with_rate_range(1e-5, 1e-2)
            .with_checkpoint_dir("/tmp/ckpts")
            .with_start_fresh(true)
            .with_keep_last_n(3);

        assert_eq!(config.parallelism, 8);
        assert_eq!(config.step_budget, 1000);
        assert_eq!(config.rate_low, 1e-5);
        assert_eq!(config.rate_high, 1e-2);
        assert_eq!(config.checkpoint_dir, PathBuf::from("/tmp/ckpts"));
        assert!(config.start_fresh);
        assert_eq!(config.keep_last_n, 3);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let err = TrainConfig::new().with_parallelism(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroParallelism);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = TrainConfig::new().with_step_budget(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroStepBudget);
    }

    #[test]
    fn test_non_positive_rates_rejected() {
        for low in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = TrainConfig::new()
                .with_rate_range(low, 1e-2)
                .validate()
                .unwrap_err();
            assert!(matches!(err, ConfigError::NonPositiveRate(_)));
        }
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = TrainConfig::new()
            .with_rate_range(1e-2, 1e-4)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedRateRange { .. }));
    }

    #[test]
    fn test_equal_bounds_are_valid() {
        assert!(TrainConfig::new().with_rate_range(1e-3, 1e-3).validate().is_ok());
    }
}
