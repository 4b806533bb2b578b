//! # Fail Handling
//!
//! What to do with a frame whose timestamps did not line up.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Policy for a frame that failed the timestamp cross-check.
///
/// Exactly two policies exist. Raw values are decoded at the boundary with
/// [`TryFrom<i32>`]; anything else is rejected there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailHandling {
    /// Use the frame anyway, flagged as out of sync.
    #[default]
    Continue,
    /// Discard the frame.
    Drop,
}

impl FailHandling {
    /// Verdict for a frame that failed the check under this policy.
    #[inline]
    #[must_use]
    pub const fn verdict(self) -> FrameVerdict {
        match self {
            Self::Continue => FrameVerdict::Flagged,
            Self::Drop => FrameVerdict::Dropped,
        }
    }
}

impl TryFrom<i32> for FailHandling {
    type Error = SyncError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Continue),
            1 => Ok(Self::Drop),
            other => Err(SyncError::InvalidFailHandling(other)),
        }
    }
}

impl fmt::Display for FailHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("continue"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// Outcome of a result check for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameVerdict {
    /// Every target was within tolerance.
    Synced,
    /// Out of sync, kept under [`FailHandling::Continue`].
    Flagged,
    /// Out of sync, discarded under [`FailHandling::Drop`].
    Dropped,
}

impl FrameVerdict {
    /// Returns whether the frame should be delivered.
    #[inline]
    #[must_use]
    pub const fn is_usable(self) -> bool {
        !matches!(self, Self::Dropped)
    }

    /// Returns whether the timestamps lined up.
    #[inline]
    #[must_use]
    pub const fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}
