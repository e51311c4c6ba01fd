//! Telemetry sinks for run progress.
//!
//! The orchestrator aggregates worker stats into periodic snapshots and
//! hands them to a `MetricsLogger`. Backends cover interactive use
//! (console table) and offline analysis (CSV).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One aggregated progress snapshot.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// Global step counter value.
    pub step: u64,
    /// Units of work completed across all workers.
    pub units: u64,
    /// Workers still running.
    pub workers_alive: usize,
    /// Most recent score reported by any worker.
    pub score: Option<f32>,
    /// Cumulative training time for the lineage, in seconds.
    pub elapsed_secs: f64,
    /// Steps per second over the lineage.
    pub steps_per_sec: f64,
}

impl RunSnapshot {
    /// Create a snapshot with the given step count.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            units: 0,
            workers_alive: 0,
            score: None,
            elapsed_secs: 0.0,
            steps_per_sec: 0.0,
        }
    }

    /// Set completed units and live worker count.
    pub fn with_progress(mut self, units: u64, workers_alive: usize) -> Self {
        self.units = units;
        self.workers_alive = workers_alive;
        self
    }

    /// Set the most recent score.
    pub fn with_score(mut self, score: Option<f32>) -> Self {
        self.score = score;
        self
    }

    /// Set timing figures.
    pub fn with_timing(mut self, elapsed_secs: f64, steps_per_sec: f64) -> Self {
        self.elapsed_secs = elapsed_secs;
        self.steps_per_sec = steps_per_sec;
        self
    }
}

/// Sink for progress snapshots.
pub trait MetricsLogger: Send {
    /// Record one snapshot.
    fn log(&mut self, snapshot: &RunSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Sink that discards all snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl MetricsLogger for NullLogger {
    fn log(&mut self, _snapshot: &RunSnapshot) {}

    fn flush(&mut self) {}
}

/// Console table, one row per snapshot.
pub struct ConsoleLogger {
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a new console logger.
    pub fn new() -> Self {
        Self { show_header: true }
    }

    fn print_header(&self) {
        println!(
            "{:>10} {:>8} {:>8} {:>10} {:>10} {:>10}",
            "Step", "Units", "Workers", "Score", "Elapsed", "SPS"
        );
        println!("{}", "-".repeat(62));
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &RunSnapshot) {
        if self.show_header {
            self.print_header();
            self.show_header = false;
        }
        let score = snapshot
            .score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10} {:>8} {:>8} {:>10} {:>9.1}s {:>10.0}",
            snapshot.step,
            snapshot.units,
            snapshot.workers_alive,
            score,
            snapshot.elapsed_secs,
            snapshot.steps_per_sec,
        );
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

/// CSV file sink.
pub struct CsvLogger {
    writer: BufWriter<File>,
    wrote_header: bool,
}

impl CsvLogger {
    /// Create a CSV logger writing to `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            wrote_header: false,
        })
    }
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &RunSnapshot) {
        if !self.wrote_header {
            let _ = writeln!(
                self.writer,
                "step,units,workers_alive,score,elapsed_secs,steps_per_sec"
            );
            self.wrote_header = true;
        }
        let score = snapshot
            .score
            .map(|s| s.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            self.writer,
            "{},{},{},{},{:.3},{:.1}",
            snapshot.step,
            snapshot.units,
            snapshot.workers_alive,
            score,
            snapshot.elapsed_secs,
            snapshot.steps_per_sec,
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Fan-out to several sinks.
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    /// Create an empty multi-logger.
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    /// Add a sink.
    pub fn add(mut self, logger: Box<dyn MetricsLogger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &RunSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_builder() {
        let snapshot = RunSnapshot::new(500)
            .with_progress(25, 4)
            .with_score(Some(1.25))
            .with_timing(10.0, 50.0);
        assert_eq!(snapshot.step, 500);
        assert_eq!(snapshot.units, 25);
        assert_eq!(snapshot.workers_alive, 4);
        assert_eq!(snapshot.score, Some(1.25));
        assert_eq!(snapshot.steps_per_sec, 50.0);
    }

    #[test]
    fn test_csv_logger_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.csv");
        {
            let mut logger = CsvLogger::create(&path).unwrap();
            logger.log(&RunSnapshot::new(100).with_score(Some(1.0)));
            logger.log(&RunSnapshot::new(200));
            logger.flush();
        }
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("step,units"));
        assert!(lines[1].starts_with("100,"));
        assert!(lines[2].starts_with("200,"));
    }

    #[test]
    fn test_multi_logger_fans_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fan.csv");
        let mut logger = MultiLogger::new()
            .add(Box::new(NullLogger))
            .add(Box::new(CsvLogger::create(&path).unwrap()));
        logger.log(&RunSnapshot::new(42));
        logger.flush();
        assert!(fs::read_to_string(&path).unwrap().contains("42,"));
    }
}
