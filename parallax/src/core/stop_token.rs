//! Cooperative cancellation token shared by the orchestrator and all workers.
//!
//! The token replaces ambient signal state: whoever needs to request a stop
//! (a SIGINT handler, a supervising thread, a test) holds a clone and flips
//! the flag; workers observe it at iteration boundaries only. Setting the
//! flag is idempotent, so repeated interrupts are harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable stop flag.
///
/// All clones observe the same underlying flag. `request_stop` may be called
/// from any thread, including a signal handler context.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a new, unset token.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a stop.
    ///
    /// Returns `true` if this call was the one that set the flag, `false`
    /// if a stop had already been requested.
    pub fn request_stop(&self) -> bool {
        !self.flag.swap(true, Ordering::Relaxed)
    }

    /// Check whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unset() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let token = StopToken::new();
        assert!(token.request_stop());
        assert!(token.is_stopped());
        // Second request reports the flag was already set.
        assert!(!token.request_stop());
        assert!(token.is_stopped());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let token = StopToken::new();
        let observer = token.clone();
        token.request_stop();
        assert!(observer.is_stopped());
    }
}
