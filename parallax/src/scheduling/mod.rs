//! Learning-rate assignment across workers.

pub mod lr_schedule;

pub use lr_schedule::log_uniform_rates;
