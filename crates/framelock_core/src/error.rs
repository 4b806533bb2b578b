//! # Buffer Error Types
//!
//! Caller-contract violations raised while configuring a frame.
//!
//! Expected absence (buffer gone, gate closed, listener dead) is never an
//! error here: those paths return `None`.

use thiserror::Error;

use crate::ids::{StreamId, UserId};

/// Errors that can occur while configuring shared buffers and buffer sets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The user is already registered against this buffer.
    #[error("user {0} already registered")]
    UserAlreadyRegistered(UserId),

    /// The registry was sealed when its buffer joined a frame.
    #[error("users registry is sealed, cannot register user {0}")]
    RegistrySealed(UserId),

    /// A buffer for this stream is already present in the set.
    #[error("stream {0} already present in buffer set")]
    DuplicateStream(StreamId),

    /// No buffer for this stream exists in the set.
    #[error("stream {0} not found in buffer set")]
    UnknownStream(StreamId),
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;
