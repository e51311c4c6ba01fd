//! Optimizer collaborators.

pub mod applier;

pub use applier::{GradientApplier, RmsPropApplier, SgdApplier};
