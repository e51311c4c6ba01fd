//! Per-worker initial learning rates, spaced log-uniformly.
//!
//! Workers explore at diverse rates: index 0 gets the low bound, the last
//! index gets the high bound, and the points in between are uniform in
//! log-space. The assignment is pure and deterministic in (low, high,
//! degree).

use crate::config::ConfigError;

/// One initial learning rate per worker index.
///
/// Rates increase monotonically with the index and all lie in
/// `[low, high]`. A single worker gets the geometric midpoint
/// `sqrt(low * high)`, since uniform spacing of one point is otherwise
/// undefined.
///
/// # Errors
///
/// `ConfigError` if `degree` is zero, either bound is not positive and
/// finite, or `low > high`.
pub fn log_uniform_rates(low: f64, high: f64, degree: usize) -> Result<Vec<f64>, ConfigError> {
    if degree == 0 {
        return Err(ConfigError::ZeroParallelism);
    }
    for &bound in [low, high].iter() {
        if !(bound.is_finite() && bound > 0.0) {
            return Err(ConfigError::NonPositiveRate(bound));
        }
    }
    if low > high {
        return Err(ConfigError::InvertedRateRange { low, high });
    }

    if degree == 1 {
        return Ok(vec![(low * high).sqrt()]);
    }

    let ln_low = low.ln();
    let ln_high = high.ln();
    let mut rates: Vec<f64> = (0..degree)
        .map(|i| {
            let t = i as f64 / (degree - 1) as f64;
            (ln_low + t * (ln_high - ln_low)).exp()
        })
        .collect();

    // Pin the endpoints so float error cannot push them outside the range.
    rates[0] = low;
    rates[degree - 1] = high;
    Ok(rates)
}
