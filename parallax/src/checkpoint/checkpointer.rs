//! Durable checkpoints: parameter blob + sidecar record, tagged by the
//! progress counter.
//!
//! Each save writes a matched pair into the checkpoint directory:
//!
//! ```text
//! checkpoint_00012345.params   # raw parameter bytes
//! checkpoint_00012345.json     # { step, wall_time_secs }
//! ```
//!
//! The blob is written before the sidecar, so a save torn by a crash leaves
//! a blob without a record, which restore reports as corruption instead of
//! silently starting a fresh lineage. Multiple historical pairs may
//! coexist; restore picks the highest tag.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BLOB_EXT: &str = "params";
const SIDECAR_EXT: &str = "json";
const FILE_STEM: &str = "checkpoint_";

/// Configuration for the checkpointer.
#[derive(Debug, Clone)]
pub struct CheckpointerConfig {
    /// Directory holding checkpoint pairs.
    pub checkpoint_dir: PathBuf,
    /// Matched pairs to retain after each save (0 = keep all).
    pub keep_last_n: usize,
}

impl CheckpointerConfig {
    /// Create a config for the given directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            keep_last_n: 5,
        }
    }

    /// Set how many pairs to retain.
    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }
}

/// Error from a checkpoint operation.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// A parameter blob exists with no matching sidecar record.
    MissingSidecar { step: u64 },
    /// A sidecar record exists with no matching parameter blob.
    MissingBlob { step: u64 },
    /// A sidecar record could not be parsed, or its recorded step does not
    /// match its filename tag.
    CorruptSidecar { path: PathBuf, reason: String },
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::MissingSidecar { step } => {
                write!(f, "checkpoint {} has a parameter blob but no sidecar record", step)
            }
            CheckpointError::MissingBlob { step } => {
                write!(f, "checkpoint {} has a sidecar record but no parameter blob", step)
            }
            CheckpointError::CorruptSidecar { path, reason } => {
                write!(f, "corrupt sidecar record {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Sidecar record persisted next to each parameter blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Progress counter value at save time.
    pub step: u64,
    /// Cumulative training wall time at save time, in seconds.
    pub wall_time_secs: f64,
}

/// A restored checkpoint: the matched triple.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    /// Serialized parameter bytes.
    pub params: Vec<u8>,
    /// Progress counter value at save time.
    pub step: u64,
    /// Cumulative training wall time at save time.
    pub wall_time: Duration,
}

/// Paths of a checkpoint pair on disk.
#[derive(Debug, Clone)]
pub struct SavedCheckpoint {
    /// Parameter blob path.
    pub blob_path: PathBuf,
    /// Sidecar record path.
    pub meta_path: PathBuf,
    /// Tag (progress counter value).
    pub step: u64,
}

/// Saves and restores matched checkpoint pairs.
pub struct Checkpointer {
    config: CheckpointerConfig,
}

impl Checkpointer {
    /// Create a checkpointer, creating the directory if needed.
    pub fn new(config: CheckpointerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    fn blob_path(&self, step: u64) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}{:08}.{}", FILE_STEM, step, BLOB_EXT))
    }

    fn meta_path(&self, step: u64) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}{:08}.{}", FILE_STEM, step, SIDECAR_EXT))
    }

    /// Persist a matched {params, step, wall time} triple.
    ///
    /// The blob is written first and the sidecar second; a pair is only
    /// considered complete once both exist. Failures are returned, never
    /// swallowed: a failed save is lost training progress.
    pub fn save(
        &self,
        params: &[u8],
        step: u64,
        wall_time: Duration,
    ) -> Result<SavedCheckpoint, CheckpointError> {
        fs::create_dir_all(&self.config.checkpoint_dir)?;

        let blob_path = self.blob_path(step);
        let meta_path = self.meta_path(step);

        fs::write(&blob_path, params)?;

        let meta = CheckpointMeta {
            step,
            wall_time_secs: wall_time.as_secs_f64(),
        };
        let encoded = serde_json::to_string_pretty(&meta).map_err(|e| {
            CheckpointError::CorruptSidecar {
                path: meta_path.clone(),
                reason: e.to_string(),
            }
        })?;
        fs::write(&meta_path, encoded)?;

        info!(
            "saved checkpoint at step {} ({} parameter bytes, wall time {:.1}s)",
            step,
            params.len(),
            meta.wall_time_secs
        );

        self.cleanup_old_checkpoints()?;

        Ok(SavedCheckpoint {
            blob_path,
            meta_path,
            step,
        })
    }

    /// Restore the most recent matched triple.
    ///
    /// Returns `Ok(None)` when the directory holds no checkpoints at all.
    /// Any unmatched blob or record anywhere in the directory is corruption
    /// and fails the restore. Losing a lineage silently is never an option;
    /// the caller may offer an explicit start-fresh override.
    pub fn restore_latest(&self) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let tags = match self.scan_tags() {
            Ok(tags) => tags,
            Err(CheckpointError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let latest = match tags.last() {
            Some(&step) => step,
            None => return Ok(None),
        };

        let record = self.restore(latest)?;
        info!(
            "restored checkpoint at step {} (wall time {:.1}s)",
            record.step,
            record.wall_time.as_secs_f64()
        );
        Ok(Some(record))
    }

    /// Restore the triple for a specific tag.
    pub fn restore(&self, step: u64) -> Result<CheckpointRecord, CheckpointError> {
        let blob_path = self.blob_path(step);
        let meta_path = self.meta_path(step);

        let params = fs::read(&blob_path)?;
        let encoded = fs::read_to_string(&meta_path)?;
        let meta: CheckpointMeta =
            serde_json::from_str(&encoded).map_err(|e| CheckpointError::CorruptSidecar {
                path: meta_path.clone(),
                reason: e.to_string(),
            })?;
        if meta.step != step {
            return Err(CheckpointError::CorruptSidecar {
                path: meta_path,
                reason: format!("record step {} does not match tag {}", meta.step, step),
            });
        }
        if !meta.wall_time_secs.is_finite() || meta.wall_time_secs < 0.0 {
            return Err(CheckpointError::CorruptSidecar {
                path: meta_path,
                reason: format!("invalid wall time {}", meta.wall_time_secs),
            });
        }

        Ok(CheckpointRecord {
            params,
            step,
            wall_time: Duration::from_secs_f64(meta.wall_time_secs),
        })
    }

    /// Tags of all complete pairs, ascending.
    pub fn list_checkpoints(&self) -> Result<Vec<u64>, CheckpointError> {
        match self.scan_tags() {
            Ok(tags) => Ok(tags),
            Err(CheckpointError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// List (blob tags, sidecar tags) present in the directory.
    fn scan_files(&self) -> Result<(Vec<u64>, Vec<u64>), CheckpointError> {
        let mut blobs = Vec::new();
        let mut sidecars = Vec::new();

        for entry in fs::read_dir(&self.config.checkpoint_dir)? {
            let path = entry?.path();
            let (stem, ext) = match (path.file_stem(), path.extension()) {
                (Some(stem), Some(ext)) => (stem, ext),
                _ => continue,
            };
            let step = match stem
                .to_str()
                .and_then(|s| s.strip_prefix(FILE_STEM))
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(step) => step,
                None => continue,
            };
            if ext == BLOB_EXT {
                blobs.push(step);
            } else if ext == SIDECAR_EXT {
                sidecars.push(step);
            }
        }

        Ok((blobs, sidecars))
    }

    /// Collect tags present in the directory, verifying every blob/record
    /// pair is matched. Result is sorted ascending.
    fn scan_tags(&self) -> Result<Vec<u64>, CheckpointError> {
        let (mut blobs, sidecars) = self.scan_files()?;

        for &step in &blobs {
            if !sidecars.contains(&step) {
                return Err(CheckpointError::MissingSidecar { step });
            }
        }
        for &step in &sidecars {
            if !blobs.contains(&step) {
                return Err(CheckpointError::MissingBlob { step });
            }
        }

        blobs.sort_unstable();
        Ok(blobs)
    }

    /// Remove the oldest pairs beyond `keep_last_n`.
    ///
    /// Only complete pairs count toward retention and only complete pairs
    /// are removed; unmatched leftovers stay on disk for restore to report.
    fn cleanup_old_checkpoints(&self) -> Result<(), CheckpointError> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }
        let (blobs, sidecars) = self.scan_files()?;
        let mut tags: Vec<u64> = blobs
            .into_iter()
            .filter(|step| sidecars.contains(step))
            .collect();
        tags.sort_unstable();
        if tags.len() <= self.config.keep_last_n {
            return Ok(());
        }
        let excess = tags.len() - self.config.keep_last_n;
        for &step in &tags[..excess] {
            debug!("removing old checkpoint pair at step {}", step);
            // Sidecar first: a failure midway leaves a blob without a
            // record, which restore reports rather than resurrecting a
            // half-removed pair as latest.
            fs::remove_file(self.meta_path(step))?;
            fs::remove_file(self.blob_path(step))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn checkpointer(dir: &Path) -> Checkpointer {
        Checkpointer::new(CheckpointerConfig::new(dir)).unwrap()
    }

    #[test]
    fn test_empty_directory_restores_none() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        assert!(ckpt.restore_latest().unwrap().is_none());
        assert!(ckpt.list_checkpoints().unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_restores_none() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(&dir.path().join("not-yet"));
        fs::remove_dir_all(dir.path().join("not-yet")).unwrap();
        assert!(ckpt.restore_latest().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_is_identity_on_the_triple() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());

        let params = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let wall = Duration::from_secs_f64(123.456);
        ckpt.save(&params, 9000, wall).unwrap();

        let record = ckpt.restore_latest().unwrap().unwrap();
        assert_eq!(record.params, params);
        assert_eq!(record.step, 9000);
        assert!((record.wall_time.as_secs_f64() - 123.456).abs() < 1e-9);
    }

    #[test]
    fn test_latest_tag_wins() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        ckpt.save(&[1], 100, Duration::from_secs(1)).unwrap();
        ckpt.save(&[2], 300, Duration::from_secs(3)).unwrap();
        ckpt.save(&[3], 200, Duration::from_secs(2)).unwrap();

        let record = ckpt.restore_latest().unwrap().unwrap();
        assert_eq!(record.step, 300);
        assert_eq!(record.params, vec![2]);
        assert_eq!(ckpt.list_checkpoints().unwrap(), vec![100, 200, 300]);
    }

    #[test]
    fn test_blob_without_sidecar_is_corrupt() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        ckpt.save(&[1], 100, Duration::from_secs(1)).unwrap();
        fs::remove_file(dir.path().join("checkpoint_00000100.json")).unwrap();

        let err = ckpt.restore_latest().unwrap_err();
        assert!(matches!(err, CheckpointError::MissingSidecar { step: 100 }));
    }

    #[test]
    fn test_sidecar_without_blob_is_corrupt() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        ckpt.save(&[1], 100, Duration::from_secs(1)).unwrap();
        fs::remove_file(dir.path().join("checkpoint_00000100.params")).unwrap();

        let err = ckpt.restore_latest().unwrap_err();
        assert!(matches!(err, CheckpointError::MissingBlob { step: 100 }));
    }

    #[test]
    fn test_unparseable_sidecar_is_corrupt() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        ckpt.save(&[1], 100, Duration::from_secs(1)).unwrap();
        fs::write(dir.path().join("checkpoint_00000100.json"), "not json").unwrap();

        let err = ckpt.restore_latest().unwrap_err();
        assert!(matches!(err, CheckpointError::CorruptSidecar { .. }));
    }

    #[test]
    fn test_tag_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let ckpt = checkpointer(dir.path());
        ckpt.save(&[1], 100, Duration::from_secs(1)).unwrap();
        let meta = CheckpointMeta {
            step: 999,
            wall_time_secs: 1.0,
        };
        fs::write(
            dir.path().join("checkpoint_00000100.json"),
            serde_json::to_string(&meta).unwrap(),
        )
        .unwrap();

        let err = ckpt.restore_latest().unwrap_err();
        assert!(matches!(err, CheckpointError::CorruptSidecar { .. }));
    }

    #[test]
    fn test_cleanup_keeps_most_recent_pairs() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpointer::new(
            CheckpointerConfig::new(dir.path()).with_keep_last_n(2),
        )
        .unwrap();

        for step in [100u64, 200, 300, 400] {
            ckpt.save(&[0], step, Duration::from_secs(1)).unwrap();
        }

        assert_eq!(ckpt.list_checkpoints().unwrap(), vec![300, 400]);
        assert!(!dir.path().join("checkpoint_00000100.params").exists());
        assert!(!dir.path().join("checkpoint_00000100.json").exists());
    }

    #[test]
    fn test_keep_all_when_zero() {
        let dir = tempdir().unwrap();
        let ckpt = Checkpointer::new(
            CheckpointerConfig::new(dir.path()).with_keep_last_n(0),
        )
        .unwrap();
        for step in [1u64, 2, 3, 4, 5, 6] {
            ckpt.save(&[0], step, Duration::from_secs(1)).unwrap();
        }
        assert_eq!(ckpt.list_checkpoints().unwrap().len(), 6);
    }
}
