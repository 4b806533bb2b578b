//! # Status Bits
//!
//! Bit-flag types for per-user and per-buffer status.
//!
//! ```text
//! UserStatus:   USED | PRE_RELEASED | RELEASED
//! BufferStatus: WRITE_IN_PROGRESS | ERROR | RETURNED_TO_POOL
//! ```
//!
//! Bits are only ever merged in, never cleared, except for
//! `WRITE_IN_PROGRESS` which tracks an active producer.

bitflags::bitflags! {
    /// Progress of one user against one buffer.
    #[derive(Default)]
    pub struct UserStatus: u32 {
        /// The user touched the buffer (a producer wrote content).
        const USED = 1 << 0;
        /// The user is done with the buffer.
        const RELEASED = 1 << 1;
        /// Later users may proceed before this user fully finishes.
        const PRE_RELEASED = 1 << 2;
    }
}

bitflags::bitflags! {
    /// State of a shared buffer as a whole.
    #[derive(Default)]
    pub struct BufferStatus: u32 {
        /// A producer currently holds the buffer for writing.
        const WRITE_IN_PROGRESS = 1 << 0;
        /// Content cannot be trusted.
        const ERROR = 1 << 1;
        /// The physical buffer went back to its pool. Terminal.
        const RETURNED_TO_POOL = 1 << 2;
    }
}
