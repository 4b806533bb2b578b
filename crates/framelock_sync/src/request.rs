//! # Request and Result Metadata
//!
//! The sync fields a capture driver attaches to a request and reads back from
//! a result. Every field is optional; the coordinator decides what a missing
//! field means.

use crate::context::ParticipantId;
use crate::policy::FailHandling;

/// Sync metadata of one capture request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Peers to rendezvous with. Required.
    pub targets: Option<Vec<ParticipantId>>,
    /// Allowed timestamp skew in microseconds. Falls back to config.
    pub tolerance_us: Option<i64>,
    /// Policy for an out-of-sync frame. Falls back to config.
    pub fail_handling: Option<FailHandling>,
}

impl SyncRequest {
    /// Request synchronized with `targets`, other fields from config.
    #[must_use]
    pub fn new(targets: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            targets: Some(targets.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub const fn with_tolerance_us(mut self, tolerance_us: i64) -> Self {
        self.tolerance_us = Some(tolerance_us);
        self
    }

    /// Sets the fail handling.
    #[must_use]
    pub const fn with_fail_handling(mut self, fail_handling: FailHandling) -> Self {
        self.fail_handling = Some(fail_handling);
        self
    }
}

/// Sync metadata of one capture result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureResult {
    /// Sensor start-of-frame timestamp in nanoseconds.
    pub timestamp_ns: Option<i64>,
}

impl CaptureResult {
    /// Result carrying a timestamp.
    #[must_use]
    pub const fn new(timestamp_ns: i64) -> Self {
        Self {
            timestamp_ns: Some(timestamp_ns),
        }
    }
}
