//! # Sync Error Types
//!
//! All errors that can occur while coordinating sync participants.

use thiserror::Error;

use crate::context::ParticipantId;
use crate::coordinator::Barrier;

/// Errors that can occur in the sync coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The participant already has a live context.
    #[error("participant {0} already started")]
    AlreadyStarted(ParticipantId),

    /// The participant has no live context.
    #[error("participant {0} not started")]
    NotStarted(ParticipantId),

    /// The participant was stopped while waiting at a barrier.
    #[error("participant {0} stopped while waiting")]
    Stopped(ParticipantId),

    /// A peer the participant was waiting for, or arriving for, was stopped.
    #[error("participant {participant} cannot meet stopped peer {peer}")]
    PeerStopped {
        /// The participant at the barrier.
        participant: ParticipantId,
        /// The stopped peer.
        peer: ParticipantId,
    },

    /// A waiter gave up before its peers arrived.
    #[error("participant {participant} timed out at the {barrier} barrier after {waited_ms}ms")]
    BarrierTimeout {
        /// The waiting participant.
        participant: ParticipantId,
        /// Which barrier it was waiting at.
        barrier: Barrier,
        /// How long it waited.
        waited_ms: u64,
    },

    /// A request or result lacked a field the check needs.
    #[error("missing sync field: {0}")]
    MissingField(&'static str),

    /// A raw fail-handling value outside the two known policies.
    #[error("invalid fail handling value: {0}")]
    InvalidFailHandling(i32),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
