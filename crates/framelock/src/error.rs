//! # Rig Error Types

use framelock_core::BufferError;
use framelock_sync::{ParticipantId, SyncError};
use thiserror::Error;

/// Errors that can occur while running a capture rig.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RigError {
    /// Buffer configuration failed.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Sync coordination failed.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Invalid rig configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No buffer came back to the camera's pool in time.
    #[error("camera {0}: buffer pool exhausted")]
    PoolExhausted(ParticipantId),

    /// The consumer stage stopped accepting frames.
    #[error("consumer stage is gone")]
    ConsumerGone,

    /// A worker thread panicked.
    #[error("worker thread of camera {0} panicked")]
    WorkerPanicked(ParticipantId),
}

/// Result type for rig operations.
pub type RigResult<T> = Result<T, RigError>;
