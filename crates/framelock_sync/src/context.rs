//! # Sync Context
//!
//! Per-participant state: one semaphore per barrier and the last reported
//! result timestamp.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::semaphore::Semaphore;

/// Identity of a sync participant, typically a camera index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

/// State of one active participant.
///
/// Lives from `start` to `stop`. At most one per participant.
#[derive(Debug)]
pub struct SyncContext {
    participant: ParticipantId,
    /// Parks this participant at the enqueue barrier.
    pub(crate) enqueue_sem: Semaphore,
    /// Parks this participant at the result barrier.
    pub(crate) result_sem: Semaphore,
    last_timestamp_ns: Mutex<Option<i64>>,
    stopped: AtomicBool,
    /// Peer whose stop pulled this participant off a barrier.
    abandoned_by: Mutex<Option<ParticipantId>>,
}

impl SyncContext {
    pub(crate) fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            enqueue_sem: Semaphore::new(),
            result_sem: Semaphore::new(),
            last_timestamp_ns: Mutex::new(None),
            stopped: AtomicBool::new(false),
            abandoned_by: Mutex::new(None),
        }
    }

    /// Owner of this context.
    #[inline]
    #[must_use]
    pub const fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Last timestamp reported at the result barrier, if any.
    #[must_use]
    pub fn last_timestamp_ns(&self) -> Option<i64> {
        *self.last_timestamp_ns.lock()
    }

    pub(crate) fn set_last_timestamp_ns(&self, timestamp_ns: Option<i64>) {
        *self.last_timestamp_ns.lock() = timestamp_ns;
    }

    /// Returns whether the participant was stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub(crate) fn abandon(&self, peer: ParticipantId) {
        *self.abandoned_by.lock() = Some(peer);
    }

    pub(crate) fn take_abandoned(&self) -> Option<ParticipantId> {
        self.abandoned_by.lock().take()
    }
}
