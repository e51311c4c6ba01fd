//! Checkpoint persistence.

pub mod checkpointer;

pub use checkpointer::{
    CheckpointError, CheckpointMeta, CheckpointRecord, Checkpointer, CheckpointerConfig,
    SavedCheckpoint,
};
