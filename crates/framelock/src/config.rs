//! # Rig Configuration
//!
//! ```toml
//! frames = 120
//! frame_interval_us = 33333
//! pool_depth = 4
//!
//! [[cameras]]
//! id = 0
//! linked = [1]
//!
//! [[cameras]]
//! id = 1
//! linked = [0]
//! clock_offset_us = 40
//!
//! [sync]
//! barrier_timeout_ms = 1000
//! default_tolerance_us = 100
//! default_fail_handling = "continue"
//! ```

use std::collections::HashSet;
use std::path::Path;

use framelock_sync::{FailHandling, ParticipantId, SyncConfig};
use serde::{Deserialize, Serialize};

use crate::error::{RigError, RigResult};

/// One simulated camera.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Participant id of the camera.
    pub id: ParticipantId,
    /// Cameras this one synchronizes with.
    #[serde(default)]
    pub linked: Vec<ParticipantId>,
    /// Constant offset added to every timestamp of this camera.
    #[serde(default)]
    pub clock_offset_us: i64,
    /// Per-camera tolerance. Falls back to `[sync]`.
    #[serde(default)]
    pub tolerance_us: Option<i64>,
    /// Per-camera fail handling. Falls back to `[sync]`.
    #[serde(default)]
    pub fail_handling: Option<FailHandling>,
}

impl CameraConfig {
    /// Camera with no links and no offset.
    #[must_use]
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            linked: Vec::new(),
            clock_offset_us: 0,
            tolerance_us: None,
            fail_handling: None,
        }
    }
}

/// Configuration of a capture rig.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Frames each camera captures.
    pub frames: u32,
    /// Nominal frame interval used to derive timestamps.
    pub frame_interval_us: i64,
    /// Buffers per stream and camera.
    pub pool_depth: usize,
    /// Capacity of the channel to the consumer stage.
    pub consumer_queue: usize,
    /// Cameras of the rig.
    pub cameras: Vec<CameraConfig>,
    /// Coordinator settings.
    pub sync: SyncConfig,
}

impl Default for RigConfig {
    fn default() -> Self {
        let mut left = CameraConfig::new(ParticipantId(0));
        left.linked.push(ParticipantId(1));
        let mut right = CameraConfig::new(ParticipantId(1));
        right.linked.push(ParticipantId(0));

        Self {
            frames: 60,
            frame_interval_us: 33_333, // 30 fps
            pool_depth: 4,
            consumer_queue: 8,
            cameras: vec![left, right],
            sync: SyncConfig::default(),
        }
    }
}

/// Simulated start-of-frame time of `frame_no`, in nanoseconds.
///
/// `None` if it does not fit in an `i64`.
pub(crate) fn capture_timestamp_ns(
    frame_no: u32,
    frame_interval_us: i64,
    clock_offset_us: i64,
) -> Option<i64> {
    i64::from(frame_no)
        .checked_mul(frame_interval_us)?
        .checked_add(clock_offset_us)?
        .checked_mul(1000)
}

impl RigConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Config` on a decode or validation error.
    pub fn from_toml_str(content: &str) -> RigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RigError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Config` if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> RigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RigError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Sets every camera's offset to its position times `skew_us`.
    pub fn apply_skew(&mut self, skew_us: i64) {
        for (i, camera) in (0_i64..).zip(self.cameras.iter_mut()) {
            camera.clock_offset_us = i * skew_us;
        }
    }

    /// Checks value ranges and camera links.
    ///
    /// # Errors
    ///
    /// `Config` describing the first problem found.
    pub fn validate(&self) -> RigResult<()> {
        if self.cameras.is_empty() {
            return Err(RigError::Config("at least one camera is required".into()));
        }
        if self.pool_depth == 0 {
            return Err(RigError::Config("pool_depth must be greater than zero".into()));
        }
        if self.consumer_queue == 0 {
            return Err(RigError::Config("consumer_queue must be greater than zero".into()));
        }
        if self.frame_interval_us <= 0 {
            return Err(RigError::Config("frame_interval_us must be positive".into()));
        }
        self.sync.validate()?;

        let mut ids = HashSet::new();
        for camera in &self.cameras {
            if !ids.insert(camera.id) {
                return Err(RigError::Config(format!("camera {} listed twice", camera.id)));
            }
        }
        for camera in &self.cameras {
            if let Some(peer) = camera.linked.iter().find(|peer| !ids.contains(peer)) {
                return Err(RigError::Config(format!(
                    "camera {} linked to unknown camera {}",
                    camera.id, peer
                )));
            }
            let last = self.frames.saturating_sub(1);
            let fits = [0, last].into_iter().all(|frame_no| {
                capture_timestamp_ns(frame_no, self.frame_interval_us, camera.clock_offset_us)
                    .is_some()
            });
            if !fits {
                return Err(RigError::Config(format!(
                    "camera {}: timestamps overflow with offset {}us over {} frames",
                    camera.id, camera.clock_offset_us, self.frames
                )));
            }
            if camera.tolerance_us.is_some_and(|t| t < 0) {
                return Err(RigError::Config(format!(
                    "camera {}: tolerance_us must not be negative",
                    camera.id
                )));
            }
        }
        Ok(())
    }
}
