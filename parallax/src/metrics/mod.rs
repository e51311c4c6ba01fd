//! Progress telemetry.

pub mod logger;

pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, NullLogger, RunSnapshot};
