//! # Capture Rig
//!
//! Simulated multi-camera capture driving buffer sets and the sync
//! coordinator end to end.
//!
//! ## Per-Frame Flow (one worker thread per camera)
//!
//! ```text
//!  enqueue barrier ─> build BufferSet ─> sensor: RAW ─> isp: RAW -> YUV
//!                                                          │
//!        ┌───────────────── result barrier + check <───────┘
//!        │
//!        ├─ Synced / Flagged ─> channel ─> consumer thread: YUV ─> release
//!        └─ Dropped ──────────> release YUV on the worker
//! ```
//!
//! RAW goes back to its pool when the ISP stage releases. YUV goes back when
//! the app stage (or a dropped frame) releases. A worker whose YUV pool runs
//! dry waits for a `FrameReleased` notification before taking a new buffer.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use framelock_core::{
    BufferScope, BufferSet, FrameEvent, FrameListener, FreeListPool, SharedBuffer, StreamId,
    UserCategory, UserId, UserStatus,
};
use framelock_sync::{
    CaptureResult, FrameVerdict, ParticipantId, SyncCoordinator, SyncError, SyncRequest,
};
use parking_lot::Mutex;

use crate::config::{capture_timestamp_ns, CameraConfig, RigConfig};
use crate::error::{RigError, RigResult};

/// Sensor node: produces RAW.
pub const SENSOR: UserId = UserId(0x100);
/// ISP node: consumes RAW, produces YUV.
pub const ISP: UserId = UserId(0x200);
/// Application: consumes YUV.
pub const APP: UserId = UserId(0x300);

/// Pipeline-internal raw stream.
pub const RAW: StreamId = StreamId(0);
/// App-visible processed stream.
pub const YUV: StreamId = StreamId(1);

/// Longest a worker waits for a buffer to come back to an empty pool.
const POOL_WAIT: Duration = Duration::from_secs(2);

/// Physical buffer of the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    /// Owning camera.
    pub camera: ParticipantId,
    /// Stream the buffer serves.
    pub stream: StreamId,
    /// Slot within the pool.
    pub slot: usize,
}

/// Per-camera counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraStats {
    /// The camera.
    pub camera: ParticipantId,
    /// Frames captured.
    pub frames: u64,
    /// Frames within tolerance.
    pub synced: u64,
    /// Out of sync, delivered flagged.
    pub flagged: u64,
    /// Out of sync, discarded.
    pub dropped: u64,
    /// Barrier waits that timed out.
    pub timeouts: u64,
    /// Frames delivered to the app stage.
    pub delivered: u64,
    /// Delivered frames carrying the ERROR bit.
    pub errored: u64,
}

impl CameraStats {
    /// Zeroed counters for `camera`.
    #[must_use]
    pub const fn new(camera: ParticipantId) -> Self {
        Self {
            camera,
            frames: 0,
            synced: 0,
            flagged: 0,
            dropped: 0,
            timeouts: 0,
            delivered: 0,
            errored: 0,
        }
    }
}

/// Outcome of a rig run.
#[derive(Clone, Debug, Default)]
pub struct RigReport {
    /// One entry per camera, in configuration order.
    pub cameras: Vec<CameraStats>,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RigReport {
    /// Total frames captured by every camera.
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.cameras.iter().map(|c| c.frames).sum()
    }

    /// Total frames delivered to the app stage.
    #[must_use]
    pub fn total_delivered(&self) -> u64 {
        self.cameras.iter().map(|c| c.delivered).sum()
    }
}

/// A frame on its way to the app stage.
struct DeliveredFrame {
    camera: ParticipantId,
    set: Arc<BufferSet<FrameHandle>>,
}

/// Wakes a worker whose pool ran dry.
struct ReleaseNotifier {
    tx: Sender<u32>,
}

impl FrameListener for ReleaseNotifier {
    fn on_frame_event(&self, frame_no: u32, event: FrameEvent) {
        if event == FrameEvent::FrameReleased {
            // A full channel already holds a wake-up.
            if let Err(TrySendError::Disconnected(_)) = self.tx.try_send(frame_no) {
                tracing::trace!("frame {} released after its worker exited", frame_no);
            }
        }
    }
}

/// Simulated multi-camera rig.
pub struct CaptureRig {
    config: RigConfig,
    sync: Arc<SyncCoordinator>,
}

impl CaptureRig {
    /// Builds a rig from a validated configuration.
    ///
    /// # Errors
    ///
    /// `Config` or `Sync` if the configuration is invalid.
    pub fn new(config: RigConfig) -> RigResult<Self> {
        config.validate()?;
        let sync = Arc::new(SyncCoordinator::new(config.sync.clone()));
        Ok(Self { config, sync })
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Coordinator shared by the cameras.
    #[must_use]
    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    /// Runs every camera for the configured number of frames.
    ///
    /// # Errors
    ///
    /// The first error of any worker, or `WorkerPanicked`.
    pub fn run(&self) -> RigResult<RigReport> {
        let start = Instant::now();
        for camera in &self.config.cameras {
            self.sync.start(camera.id)?;
        }

        let stats: Arc<Mutex<Vec<CameraStats>>> = Arc::new(Mutex::new(
            self.config
                .cameras
                .iter()
                .map(|c| CameraStats::new(c.id))
                .collect(),
        ));

        let (frame_tx, frame_rx) = bounded::<DeliveredFrame>(self.config.consumer_queue);
        let consumer = spawn_consumer(frame_rx, Arc::clone(&stats), &self.config.cameras);

        let workers: Vec<(ParticipantId, JoinHandle<RigResult<()>>)> = self
            .config
            .cameras
            .iter()
            .enumerate()
            .map(|(index, camera)| {
                let worker = CameraWorker {
                    index,
                    camera: camera.clone(),
                    frames: self.config.frames,
                    frame_interval_us: self.config.frame_interval_us,
                    pool_depth: self.config.pool_depth,
                    sync: Arc::clone(&self.sync),
                    stats: Arc::clone(&stats),
                    frame_tx: frame_tx.clone(),
                };
                (camera.id, thread::spawn(move || worker.run()))
            })
            .collect();
        drop(frame_tx);

        let mut errors = Vec::new();
        for (camera, handle) in workers {
            let outcome = handle.join().unwrap_or(Err(RigError::WorkerPanicked(camera)));
            if let Err(e) = outcome {
                tracing::warn!("camera {} failed: {}", camera, e);
                errors.push(e);
            }
        }
        if consumer.join().is_err() {
            errors.push(RigError::ConsumerGone);
        }

        // Failed workers already left the session.
        for camera in &self.config.cameras {
            if self.sync.is_started(camera.id) {
                self.sync.stop(camera.id)?;
            }
        }
        // Peers of a failed camera fail with `PeerStopped`; report the cause.
        let root = errors
            .iter()
            .position(|e| !matches!(e, RigError::Sync(SyncError::PeerStopped { .. })))
            .unwrap_or(0);
        if root < errors.len() {
            return Err(errors.swap_remove(root));
        }

        let cameras = stats.lock().clone();
        Ok(RigReport {
            cameras,
            elapsed: start.elapsed(),
        })
    }
}

fn spawn_consumer(
    frame_rx: Receiver<DeliveredFrame>,
    stats: Arc<Mutex<Vec<CameraStats>>>,
    cameras: &[CameraConfig],
) -> JoinHandle<()> {
    let order: Vec<ParticipantId> = cameras.iter().map(|c| c.id).collect();
    thread::spawn(move || {
        for frame in frame_rx {
            let acquired = frame.set.get_buffer(YUV, APP);
            let _ = frame.set.mark_user_status(YUV, APP, UserStatus::USED);
            let _ = frame.set.apply_release(APP);

            let Some(slot) = order.iter().position(|&id| id == frame.camera) else {
                continue;
            };
            let mut stats = stats.lock();
            match acquired {
                Some(buffer) => {
                    stats[slot].delivered += 1;
                    if buffer.is_error() {
                        stats[slot].errored += 1;
                    }
                }
                None => tracing::warn!(
                    "camera {} frame {}: app could not acquire YUV",
                    frame.camera,
                    frame.set.frame_no()
                ),
            }
        }
    })
}

/// Takes a camera out of the sync session unless the worker finished cleanly.
///
/// Runs on error returns and during unwinding, so peers parked on the camera
/// are pulled off their barrier instead of waiting for it.
struct LeaveOnFailure<'a> {
    sync: &'a SyncCoordinator,
    camera: ParticipantId,
    finished: bool,
}

impl Drop for LeaveOnFailure<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("camera {} leaving the sync session early", self.camera);
        if let Err(e) = self.sync.stop(self.camera) {
            tracing::debug!("camera {}: {}", self.camera, e);
        }
    }
}

/// Everything one camera thread needs.
struct CameraWorker {
    index: usize,
    camera: CameraConfig,
    frames: u32,
    frame_interval_us: i64,
    pool_depth: usize,
    sync: Arc<SyncCoordinator>,
    stats: Arc<Mutex<Vec<CameraStats>>>,
    frame_tx: Sender<DeliveredFrame>,
}

impl CameraWorker {
    fn run(self) -> RigResult<()> {
        let mut guard = LeaveOnFailure {
            sync: &self.sync,
            camera: self.camera.id,
            finished: false,
        };
        self.capture()?;
        guard.finished = true;
        Ok(())
    }

    fn capture(&self) -> RigResult<()> {
        let id = self.camera.id;
        let raw_pool = Arc::new(self.pool(RAW));
        let yuv_pool = Arc::new(self.pool(YUV));

        let (released_tx, released_rx) = bounded(self.pool_depth);
        let notifier = Arc::new(ReleaseNotifier { tx: released_tx });
        let notifier_weak: Weak<ReleaseNotifier> = Arc::downgrade(&notifier);
        let notifier_weak: Weak<dyn FrameListener> = notifier_weak;

        let mut request = SyncRequest::new(self.camera.linked.iter().copied());
        request.tolerance_us = self.camera.tolerance_us;
        request.fail_handling = self.camera.fail_handling;

        for frame_no in 0..self.frames {
            match self.sync.enqueue(id, &request) {
                Ok(_) => {}
                Err(SyncError::BarrierTimeout { .. }) => self.stats_mut(|s| s.timeouts += 1),
                Err(e) => return Err(e.into()),
            }

            while yuv_pool.free_count() == 0 || raw_pool.free_count() == 0 {
                if released_rx.recv_timeout(POOL_WAIT).is_err() {
                    return Err(RigError::PoolExhausted(id));
                }
            }
            let raw = raw_pool.acquire().ok_or(RigError::PoolExhausted(id))?;
            let yuv = yuv_pool.acquire().ok_or(RigError::PoolExhausted(id))?;

            let set = Arc::new(BufferSet::new(frame_no, frame_no));
            let _ = set.attach_listener(Weak::clone(&notifier_weak));
            set.add(
                SharedBuffer::new(RAW, raw_pool.name(), raw, &raw_pool)
                    .with_scope(BufferScope::Internal)
                    .with_user(SENSOR, UserCategory::Producer)?
                    .with_user(ISP, UserCategory::Consumer)?,
            )?;
            set.add(
                SharedBuffer::new(YUV, yuv_pool.name(), yuv, &yuv_pool)
                    .with_scope(BufferScope::App)
                    .with_user(ISP, UserCategory::Producer)?
                    .with_user(APP, UserCategory::Consumer)?,
            )?;

            Self::process(&set);

            let timestamp_ns = self.timestamp_ns(frame_no)?;
            let verdict = match self
                .sync
                .check_result(id, &request, &CaptureResult::new(timestamp_ns))
            {
                Ok(verdict) => verdict,
                Err(SyncError::BarrierTimeout { .. }) => {
                    self.stats_mut(|s| s.timeouts += 1);
                    FrameVerdict::Dropped
                }
                Err(e) => return Err(e.into()),
            };

            self.stats_mut(|s| {
                s.frames += 1;
                match verdict {
                    FrameVerdict::Synced => s.synced += 1,
                    FrameVerdict::Flagged => s.flagged += 1,
                    FrameVerdict::Dropped => s.dropped += 1,
                }
            });

            if verdict.is_usable() {
                self.frame_tx
                    .send(DeliveredFrame { camera: id, set })
                    .map_err(|_| RigError::ConsumerGone)?;
            } else {
                let _ = set.apply_release(APP);
            }
        }

        drop(notifier);
        Ok(())
    }

    /// Sensor and ISP stages of one frame.
    fn process(set: &BufferSet<FrameHandle>) {
        if set.get_buffer(RAW, SENSOR).is_some() {
            let _ = set.mark_user_status(RAW, SENSOR, UserStatus::USED);
        }
        let _ = set.apply_release(SENSOR);

        let raw_in = set.get_buffer(RAW, ISP);
        let yuv_out = set.get_buffer(YUV, ISP);
        if raw_in.is_some() && yuv_out.is_some() {
            let _ = set.mark_user_status(YUV, ISP, UserStatus::USED);
        }
        let _ = set.apply_release(ISP);
    }

    fn pool(&self, stream: StreamId) -> FreeListPool<FrameHandle> {
        let name = format!("{}:{}", self.camera.id, if stream == RAW { "raw" } else { "yuv" });
        let handles = (0..self.pool_depth)
            .map(|slot| FrameHandle {
                camera: self.camera.id,
                stream,
                slot,
            })
            .collect();
        FreeListPool::new(name, handles)
    }

    fn timestamp_ns(&self, frame_no: u32) -> RigResult<i64> {
        capture_timestamp_ns(frame_no, self.frame_interval_us, self.camera.clock_offset_us)
            .ok_or_else(|| {
                RigError::Config(format!(
                    "camera {}: frame {} timestamp out of range",
                    self.camera.id, frame_no
                ))
            })
    }

    fn stats_mut(&self, update: impl FnOnce(&mut CameraStats)) {
        update(&mut self.stats.lock()[self.index]);
    }
}
