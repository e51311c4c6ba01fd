//! Shared parameter store mutated in place by all workers.
//!
//! Exactly one logical parameter set exists per process. Workers read
//! consistent snapshots for inference and contribute updates concurrently.
//!
//! # Consistency policy
//!
//! - Reads are eventually consistent: a snapshot reflects the state between
//!   two updates, never a torn mix of concurrent writes, but it may be stale
//!   relative to updates applied after the read lock was released.
//! - Writes are exact: conflicting writers serialize on the lock, so the
//!   final state is some serialization of every submitted update. No update
//!   is dropped on contention, and a rejected update leaves the parameters
//!   untouched.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::optim::GradientApplier;

/// Error from a parameter store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Gradient length does not match the parameter count.
    GradientLengthMismatch { expected: usize, got: usize },
    /// Restore blob is not a whole number of f32 values.
    BlobLength { len: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::GradientLengthMismatch { expected, got } => {
                write!(f, "gradient has {} values, parameters have {}", got, expected)
            }
            StoreError::BlobLength { len } => {
                write!(f, "parameter blob length {} is not a multiple of 4", len)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// The single shared parameter set.
#[derive(Debug)]
pub struct ParamStore {
    params: RwLock<Vec<f32>>,
    /// Bumped on every applied update or restore.
    generation: AtomicU64,
}

impl ParamStore {
    /// Create a store holding the given initial parameters.
    pub fn new(initial: Vec<f32>) -> Self {
        Self {
            params: RwLock::new(initial),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.read().len()
    }

    /// Whether the store holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.read().is_empty()
    }

    /// Number of updates (and restores) applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Consistent copy of the parameters for inference.
    ///
    /// The copy is taken under the read lock: it reflects the state before
    /// or after any given update, never a partial write.
    pub fn snapshot(&self) -> Vec<f32> {
        self.params.read().clone()
    }

    /// Apply one gradient contribution through the given applier.
    ///
    /// Concurrent callers serialize on the write lock; the contribution is
    /// either applied in full or, on a length mismatch, not at all.
    pub fn apply_update<A>(
        &self,
        applier: &A,
        gradients: &[f32],
        learning_rate: f64,
    ) -> Result<(), StoreError>
    where
        A: GradientApplier + ?Sized,
    {
        let mut params = self.params.write();
        if gradients.len() != params.len() {
            return Err(StoreError::GradientLengthMismatch {
                expected: params.len(),
                got: gradients.len(),
            });
        }
        applier.apply(&mut params, gradients, learning_rate);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Serialize the full parameter set to a byte blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let params = self.params.read();
        bytemuck::cast_slice(params.as_slice()).to_vec()
    }

    /// Replace the full parameter set from a byte blob.
    ///
    /// Restore never merges: the current state is discarded entirely.
    pub fn restore_from_bytes(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if bytes.len() % std::mem::size_of::<f32>() != 0 {
            return Err(StoreError::BlobLength { len: bytes.len() });
        }
        let restored: Vec<f32> = bytemuck::pod_collect_to_vec(bytes);
        *self.params.write() = restored;
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

/// Shared parameter store.
pub type SharedParamStore = Arc<ParamStore>;

/// Create a new shared parameter store.
pub fn param_store(initial: Vec<f32>) -> SharedParamStore {
    Arc::new(ParamStore::new(initial))
}
