//! Gradient appliers: the update rule invoked under the parameter store's
//! write lock.
//!
//! The applier owns the numeric rule only; locking, length validation, and
//! serialization of conflicting writers belong to the store. Appliers that
//! carry accumulator state (RMSProp) share one accumulator set across all
//! workers and guard it themselves.

use parking_lot::Mutex;

/// Update rule applied to shared parameters.
pub trait GradientApplier: Send + Sync {
    /// Mutate `params` in place using `gradients` at `learning_rate`.
    ///
    /// `params` and `gradients` have equal length (enforced by the store).
    fn apply(&self, params: &mut [f32], gradients: &[f32], learning_rate: f64);
}

/// Plain stochastic gradient descent: `p -= lr * g`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SgdApplier;

impl GradientApplier for SgdApplier {
    fn apply(&self, params: &mut [f32], gradients: &[f32], learning_rate: f64) {
        for (p, &g) in params.iter_mut().zip(gradients.iter()) {
            *p -= (learning_rate * g as f64) as f32;
        }
    }
}

/// RMSProp with a single accumulator set shared by all workers.
///
/// `ms_i = decay * ms_i + (1 - decay) * g_i^2`
/// `p_i -= lr * g_i / (sqrt(ms_i) + epsilon)`
///
/// An optional global-norm clip rescales the gradient before the update.
#[derive(Debug)]
pub struct RmsPropApplier {
    decay: f64,
    epsilon: f64,
    clip_norm: Option<f64>,
    mean_square: Mutex<Vec<f64>>,
}

impl RmsPropApplier {
    /// Create an applier with the given decay and epsilon.
    pub fn new(decay: f64, epsilon: f64) -> Self {
        Self {
            decay,
            epsilon,
            clip_norm: None,
            mean_square: Mutex::new(Vec::new()),
        }
    }

    /// Enable gradient clipping by global norm.
    pub fn with_clip_norm(mut self, clip_norm: f64) -> Self {
        self.clip_norm = Some(clip_norm);
        self
    }

    /// Configured decay.
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Configured epsilon.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl GradientApplier for RmsPropApplier {
    fn apply(&self, params: &mut [f32], gradients: &[f32], learning_rate: f64) {
        let scale = match self.clip_norm {
            Some(clip) => {
                let norm = gradients
                    .iter()
                    .map(|&g| (g as f64) * (g as f64))
                    .sum::<f64>()
                    .sqrt();
                if norm > clip && norm > 0.0 {
                    clip / norm
                } else {
                    1.0
                }
            }
            None => 1.0,
        };

        let mut mean_square = self.mean_square.lock();
        if mean_square.len() != params.len() {
            // First update, or the store was restored at a new size.
            *mean_square = vec![0.0; params.len()];
        }

        for ((p, &g), ms) in params
            .iter_mut()
            .zip(gradients.iter())
            .zip(mean_square.iter_mut())
        {
            let g = g as f64 * scale;
            *ms = self.decay * *ms + (1.0 - self.decay) * g * g;
            *p -= (learning_rate * g / (ms.sqrt() + self.epsilon)) as f32;
        }
    }
}
