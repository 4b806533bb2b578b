//! # Sync Coordinator
//!
//! Rendezvous of independent capture pipelines.
//!
//! ## Dynamic-Membership Barrier
//!
//! ```text
//!   A arrive {B,C}:  queue [ ]      B,C missing -> push A, park      queue [A]
//!   B arrive {A,C}:  queue [A]      C missing   -> push B, park      queue [A,B]
//!   C arrive {A,B}:  queue [A,B]    all waiting -> pop A,B, post A,B queue [ ]
//!                                                  C returns at once
//! ```
//!
//! There is no fixed group or leader. Targets are supplied on every call, and
//! whoever finds all its targets already parked does the waking. The check and
//! the push/pop happen under one lock.
//!
//! Two barriers exist, with identical mechanics and separate queues:
//! the enqueue barrier before submitting a request, and the result barrier
//! which also exchanges timestamps. A participant that passes both barriers
//! every frame cannot overwrite its timestamp before its peers read it: its
//! next result arrival lies behind the next enqueue barrier, which the peers
//! reach only after finishing their check.
//!
//! ## Leaving
//!
//! `stop` pulls the participant out of both queues and also pulls out every
//! waiter that targets it; those return `PeerStopped`. Later arrivals that
//! target a stopped participant fail the same way instead of parking.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::config::SyncConfig;
use crate::context::{ParticipantId, SyncContext};
use crate::error::{SyncError, SyncResult};
use crate::policy::FrameVerdict;
use crate::request::{CaptureResult, SyncRequest};
use crate::semaphore::Semaphore;

/// The two rendezvous points of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// Before a request is submitted.
    Enqueue,
    /// After the capture result arrived.
    Result,
}

impl fmt::Display for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueue => f.write_str("enqueue"),
            Self::Result => f.write_str("result"),
        }
    }
}

/// Role a participant ended up playing at a barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrivalRole {
    /// Parked until the last arriver woke it.
    Waited,
    /// Found every target parked, woke them, did not block.
    Released,
    /// Non-blocking arrival that was not the last one. Nothing changed.
    Skipped,
}

/// A parked participant and the peers it waits for.
#[derive(Debug)]
struct Waiter {
    id: ParticipantId,
    peers: Vec<ParticipantId>,
}

/// Shared barrier logic for one capture session.
///
/// # Thread Safety
///
/// Every method may be called from any thread. Waiting happens on the
/// caller's own semaphore, never while holding a queue lock.
///
/// # Example
///
/// ```rust,ignore
/// let sync = SyncCoordinator::new(SyncConfig::default());
/// sync.start(CAM0)?;
///
/// let request = SyncRequest::new([CAM1]).with_tolerance_us(100);
/// sync.enqueue(CAM0, &request)?;
/// // ... capture ...
/// let verdict = sync.check_result(CAM0, &request, &CaptureResult::new(sof_ns))?;
/// ```
#[derive(Debug)]
pub struct SyncCoordinator {
    config: SyncConfig,
    contexts: RwLock<HashMap<ParticipantId, Arc<SyncContext>>>,
    /// Stopped and not restarted since.
    departed: RwLock<HashSet<ParticipantId>>,
    enqueue_queue: Mutex<Vec<Waiter>>,
    result_queue: Mutex<Vec<Waiter>>,
}

impl SyncCoordinator {
    /// Creates a coordinator with no participants.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            contexts: RwLock::new(HashMap::new()),
            departed: RwLock::new(HashSet::new()),
            enqueue_queue: Mutex::new(Vec::new()),
            result_queue: Mutex::new(Vec::new()),
        }
    }

    /// Configuration in effect.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Creates the context of `id`.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` if `id` has a live context.
    pub fn start(&self, id: ParticipantId) -> SyncResult<()> {
        let mut contexts = self.contexts.write();
        if contexts.contains_key(&id) {
            return Err(SyncError::AlreadyStarted(id));
        }
        contexts.insert(id, Arc::new(SyncContext::new(id)));
        drop(contexts);
        self.departed.write().remove(&id);
        tracing::info!("sync participant {} started", id);
        Ok(())
    }

    /// Destroys the context of `id` and removes it from both queues.
    ///
    /// A thread of `id` parked at a barrier, or about to park, returns
    /// `Stopped`. Parked peers that target `id` return `PeerStopped`.
    ///
    /// # Errors
    ///
    /// `NotStarted` if `id` has no live context.
    pub fn stop(&self, id: ParticipantId) -> SyncResult<()> {
        let ctx = self
            .contexts
            .write()
            .remove(&id)
            .ok_or(SyncError::NotStarted(id))?;
        ctx.mark_stopped();
        // Published before the queues are touched: an arrival either sees
        // `id` as departed or is already queued and gets pulled below.
        self.departed.write().insert(id);

        for barrier in [Barrier::Enqueue, Barrier::Result] {
            let mut queue = self.queue(barrier).lock();
            let (abandoned, kept): (Vec<Waiter>, Vec<Waiter>) = queue
                .drain(..)
                .filter(|w| w.id != id)
                .partition(|w| w.peers.contains(&id));
            *queue = kept;
            let wake: Vec<Arc<SyncContext>> = {
                let contexts = self.contexts.read();
                abandoned
                    .iter()
                    .filter_map(|w| contexts.get(&w.id).cloned())
                    .collect()
            };
            drop(queue);

            for peer_ctx in &wake {
                tracing::debug!(
                    "{} barrier: {} pulled off, peer {} stopped",
                    barrier,
                    peer_ctx.participant(),
                    id
                );
                peer_ctx.abandon(id);
                Self::semaphore(peer_ctx, barrier).post();
            }
            // Posted even when `id` is not queued: a releaser may have popped
            // it already, or it may be between arrival and parking. The
            // context is gone, so a surplus permit is never seen again.
            Self::semaphore(&ctx, barrier).post();
        }
        tracing::info!("sync participant {} stopped", id);
        Ok(())
    }

    /// Returns whether `id` has a live context.
    #[must_use]
    pub fn is_started(&self, id: ParticipantId) -> bool {
        self.contexts.read().contains_key(&id)
    }

    /// Participants currently parked at `barrier`, in arrival order.
    #[must_use]
    pub fn waiting(&self, barrier: Barrier) -> Vec<ParticipantId> {
        self.queue(barrier).lock().iter().map(|w| w.id).collect()
    }

    /// Last timestamp `id` reported at the result barrier.
    #[must_use]
    pub fn last_timestamp_ns(&self, id: ParticipantId) -> Option<i64> {
        self.context(id).ok()?.last_timestamp_ns()
    }

    /// Enqueue barrier: returns once every target arrived too.
    ///
    /// # Errors
    ///
    /// `NotStarted`, `PeerStopped`, `BarrierTimeout` or `Stopped`.
    pub fn arrive(&self, id: ParticipantId, targets: &[ParticipantId]) -> SyncResult<ArrivalRole> {
        self.arrive_at(Barrier::Enqueue, id, targets, true)
    }

    /// Enqueue barrier driven by request metadata.
    ///
    /// # Errors
    ///
    /// `MissingField("targets")` if the request names no targets, otherwise
    /// as [`Self::arrive`].
    pub fn enqueue(&self, id: ParticipantId, request: &SyncRequest) -> SyncResult<ArrivalRole> {
        let targets = request
            .targets
            .as_deref()
            .ok_or(SyncError::MissingField("targets"))?;
        self.arrive(id, targets)
    }

    /// Result barrier plus timestamp cross-check.
    ///
    /// Stores `timestamp_ns` as the caller's last timestamp, rendezvous with
    /// `targets`, then compares against every target's last timestamp.
    /// The skew is truncated to whole microseconds and is in sync when it does
    /// not exceed `tolerance_us`. A target without a context or a timestamp
    /// is out of sync.
    ///
    /// # Errors
    ///
    /// As [`Self::arrive`].
    pub fn check_timestamps(
        &self,
        id: ParticipantId,
        targets: &[ParticipantId],
        timestamp_ns: i64,
        tolerance_us: i64,
    ) -> SyncResult<bool> {
        self.context(id)?.set_last_timestamp_ns(Some(timestamp_ns));
        let _ = self.arrive_at(Barrier::Result, id, targets, true)?;
        Ok(self.compare(id, targets, timestamp_ns, tolerance_us))
    }

    /// Result check driven by request and result metadata.
    ///
    /// Missing tolerance and fail handling fall back to the configuration.
    /// A missing timestamp fails closed: the caller clears its stored
    /// timestamp and makes a non-blocking arrival, so peers already parked
    /// are released (and see the mismatch) instead of stalling. The caller
    /// never waits for peers that have not arrived yet; such a peer finds no
    /// partner at the result barrier and gets `BarrierTimeout` once its
    /// timeout runs out.
    ///
    /// # Errors
    ///
    /// `MissingField` for missing targets or timestamp, otherwise as
    /// [`Self::check_timestamps`].
    pub fn check_result(
        &self,
        id: ParticipantId,
        request: &SyncRequest,
        result: &CaptureResult,
    ) -> SyncResult<FrameVerdict> {
        let targets = request
            .targets
            .as_deref()
            .ok_or(SyncError::MissingField("targets"))?;
        let tolerance_us = request
            .tolerance_us
            .unwrap_or(self.config.default_tolerance_us);
        let fail_handling = request
            .fail_handling
            .unwrap_or(self.config.default_fail_handling);

        let Some(timestamp_ns) = result.timestamp_ns else {
            tracing::warn!("participant {}: result carries no timestamp", id);
            self.context(id)?.set_last_timestamp_ns(None);
            let _ = self.arrive_at(Barrier::Result, id, targets, false)?;
            return Err(SyncError::MissingField("timestamp_ns"));
        };

        if self.check_timestamps(id, targets, timestamp_ns, tolerance_us)? {
            return Ok(FrameVerdict::Synced);
        }
        let verdict = fail_handling.verdict();
        tracing::warn!(
            "participant {}: frame at {}ns out of sync, {} -> {:?}",
            id,
            timestamp_ns,
            fail_handling,
            verdict
        );
        Ok(verdict)
    }

    fn arrive_at(
        &self,
        barrier: Barrier,
        id: ParticipantId,
        targets: &[ParticipantId],
        blocking: bool,
    ) -> SyncResult<ArrivalRole> {
        let ctx = self.context(id)?;

        let mut peers: Vec<ParticipantId> =
            targets.iter().copied().filter(|&t| t != id).collect();
        peers.sort_unstable();
        peers.dedup();
        if peers.is_empty() {
            return Ok(ArrivalRole::Released);
        }

        let queue = self.queue(barrier);
        let mut waiting = queue.lock();

        let gone = {
            let departed = self.departed.read();
            peers.iter().copied().find(|p| departed.contains(p))
        };
        if let Some(peer) = gone {
            drop(waiting);
            tracing::warn!("{} barrier: {} targets stopped peer {}", barrier, id, peer);
            return Err(SyncError::PeerStopped { participant: id, peer });
        }

        let present = peers
            .iter()
            .filter(|&&p| waiting.iter().any(|w| w.id == p))
            .count();

        if present < peers.len() {
            if !blocking {
                tracing::debug!(
                    "{} barrier: {} not last ({}/{} peers parked), not waiting",
                    barrier,
                    id,
                    present,
                    peers.len()
                );
                return Ok(ArrivalRole::Skipped);
            }
            if ctx.is_stopped() {
                return Err(SyncError::Stopped(id));
            }
            if !waiting.iter().any(|w| w.id == id) {
                waiting.push(Waiter {
                    id,
                    peers: peers.clone(),
                });
            }
            drop(waiting);
            tracing::debug!(
                "{} barrier: {} parks ({}/{} peers parked)",
                barrier,
                id,
                present,
                peers.len()
            );
            return self.park(barrier, &ctx);
        }

        // Peer contexts are pinned while the queue is still locked, so a
        // concurrent `stop` cannot leave a popped peer without its wake-up.
        waiting.retain(|w| !peers.contains(&w.id));
        let wake: Vec<Arc<SyncContext>> = {
            let contexts = self.contexts.read();
            peers
                .iter()
                .filter_map(|peer| {
                    let found = contexts.get(peer).cloned();
                    if found.is_none() {
                        tracing::warn!("{} barrier: peer {} stopped before wake", barrier, peer);
                    }
                    found
                })
                .collect()
        };
        drop(waiting);

        for peer_ctx in &wake {
            Self::semaphore(peer_ctx, barrier).post();
        }
        tracing::debug!("{} barrier: {} released {:?}", barrier, id, peers);
        Ok(ArrivalRole::Released)
    }

    /// Parks on the caller's semaphore for `barrier`.
    fn park(&self, barrier: Barrier, ctx: &SyncContext) -> SyncResult<ArrivalRole> {
        let id = ctx.participant();
        let sem = Self::semaphore(ctx, barrier);

        match self.config.barrier_timeout() {
            None => sem.wait(),
            Some(timeout) => {
                let start = Instant::now();
                if !sem.wait_timeout(timeout) {
                    let mut waiting = self.queue(barrier).lock();
                    if let Some(pos) = waiting.iter().position(|w| w.id == id) {
                        waiting.remove(pos);
                        drop(waiting);
                        let waited_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                        tracing::warn!(
                            "{} barrier: {} gave up after {}ms",
                            barrier,
                            id,
                            waited_ms
                        );
                        return Err(SyncError::BarrierTimeout {
                            participant: id,
                            barrier,
                            waited_ms,
                        });
                    }
                    drop(waiting);
                    // Already popped by a releaser or by `stop`: a post is on
                    // the way. Keep the wait bounded and watch for a stop.
                    while !sem.wait_timeout(timeout) {
                        if ctx.is_stopped() {
                            return Err(SyncError::Stopped(id));
                        }
                        tracing::warn!("{} barrier: {} still awaiting its wake-up", barrier, id);
                    }
                }
            }
        }

        if ctx.is_stopped() {
            return Err(SyncError::Stopped(id));
        }
        if let Some(peer) = ctx.take_abandoned() {
            return Err(SyncError::PeerStopped { participant: id, peer });
        }
        Ok(ArrivalRole::Waited)
    }

    fn compare(
        &self,
        id: ParticipantId,
        targets: &[ParticipantId],
        timestamp_ns: i64,
        tolerance_us: i64,
    ) -> bool {
        let tolerance_us = u64::try_from(tolerance_us).unwrap_or(0);
        let contexts = self.contexts.read();

        let mut in_sync = true;
        for &peer in targets.iter().filter(|&&t| t != id) {
            let Some(other_ns) = contexts.get(&peer).and_then(|c| c.last_timestamp_ns()) else {
                tracing::warn!("participant {}: peer {} has no timestamp", id, peer);
                in_sync = false;
                continue;
            };
            let skew_us = timestamp_ns.abs_diff(other_ns) / 1000;
            if skew_us > tolerance_us {
                tracing::debug!(
                    "participant {}: skew to {} is {}us (tolerance {}us)",
                    id,
                    peer,
                    skew_us,
                    tolerance_us
                );
                in_sync = false;
            }
        }
        in_sync
    }

    fn context(&self, id: ParticipantId) -> SyncResult<Arc<SyncContext>> {
        self.contexts
            .read()
            .get(&id)
            .cloned()
            .ok_or(SyncError::NotStarted(id))
    }

    fn queue(&self, barrier: Barrier) -> &Mutex<Vec<Waiter>> {
        match barrier {
            Barrier::Enqueue => &self.enqueue_queue,
            Barrier::Result => &self.result_queue,
        }
    }

    fn semaphore(ctx: &SyncContext, barrier: Barrier) -> &Semaphore {
        match barrier {
            Barrier::Enqueue => &ctx.enqueue_sem,
            Barrier::Result => &ctx.result_sem,
        }
    }
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::policy::FailHandling;

    const A: ParticipantId = ParticipantId(0);
    const B: ParticipantId = ParticipantId(1);
    const C: ParticipantId = ParticipantId(2);

    fn coordinator(ids: &[ParticipantId], timeout_ms: u64) -> Arc<SyncCoordinator> {
        let sync = Arc::new(SyncCoordinator::new(SyncConfig {
            barrier_timeout_ms: Some(timeout_ms),
            ..SyncConfig::default()
        }));
        for &id in ids {
            sync.start(id).unwrap();
        }
        sync
    }

    fn wait_until_parked(sync: &SyncCoordinator, barrier: Barrier, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sync.waiting(barrier).len() < count {
            assert!(Instant::now() < deadline, "peers never parked");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let sync = SyncCoordinator::default();
        sync.start(A).unwrap();
        assert_eq!(sync.start(A), Err(SyncError::AlreadyStarted(A)));
        assert!(sync.is_started(A));
        sync.stop(A).unwrap();
        assert_eq!(sync.stop(A), Err(SyncError::NotStarted(A)));
        assert_eq!(sync.arrive(A, &[B]), Err(SyncError::NotStarted(A)));
    }

    #[test]
    fn test_no_peers_passes_immediately() {
        let sync = coordinator(&[A], 100);
        assert_eq!(sync.arrive(A, &[]), Ok(ArrivalRole::Released));
        assert_eq!(sync.arrive(A, &[A]), Ok(ArrivalRole::Released));
    }

    #[test]
    fn test_two_party_barrier() {
        let sync = coordinator(&[A, B], 5000);
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.arrive(A, &[B]))
        };
        wait_until_parked(&sync, Barrier::Enqueue, 1);

        assert_eq!(sync.arrive(B, &[A]), Ok(ArrivalRole::Released));
        assert_eq!(waiter.join().unwrap(), Ok(ArrivalRole::Waited));
        assert!(sync.waiting(Barrier::Enqueue).is_empty());
    }

    #[test]
    fn test_timeout_leaves_queue_clean() {
        let sync = coordinator(&[A, B], 20);
        let err = sync.arrive(A, &[B]).unwrap_err();
        assert!(matches!(
            err,
            SyncError::BarrierTimeout { participant: A, barrier: Barrier::Enqueue, .. }
        ));
        assert!(sync.waiting(Barrier::Enqueue).is_empty());

        // B is not released by the stale arrival of A: it parks and times out.
        assert!(sync.arrive(B, &[A]).is_err());
    }

    #[test]
    fn test_stop_wakes_parked_participant() {
        let sync = coordinator(&[A, B], 5000);
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.arrive(A, &[B]))
        };
        wait_until_parked(&sync, Barrier::Enqueue, 1);

        sync.stop(A).unwrap();
        assert_eq!(waiter.join().unwrap(), Err(SyncError::Stopped(A)));
        assert!(sync.waiting(Barrier::Enqueue).is_empty());
    }

    #[test]
    fn test_result_exchange_within_tolerance() {
        let sync = coordinator(&[A, B], 5000);
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.check_timestamps(A, &[B], 2_000_000, 100))
        };
        wait_until_parked(&sync, Barrier::Result, 1);

        assert_eq!(sync.check_timestamps(B, &[A], 2_099_999, 100), Ok(true));
        assert_eq!(waiter.join().unwrap(), Ok(true));
        assert_eq!(sync.last_timestamp_ns(A), Some(2_000_000));
    }

    #[test]
    fn test_verdict_follows_fail_handling() {
        let sync = coordinator(&[A, B], 5000);
        let request = SyncRequest::new([A])
            .with_tolerance_us(10)
            .with_fail_handling(FailHandling::Drop);
        let waiter = {
            let sync = Arc::clone(&sync);
            let request = SyncRequest::new([B]).with_tolerance_us(10);
            thread::spawn(move || sync.check_result(A, &request, &CaptureResult::new(0)))
        };
        wait_until_parked(&sync, Barrier::Result, 1);

        let verdict = sync.check_result(B, &request, &CaptureResult::new(50_000));
        assert_eq!(verdict, Ok(FrameVerdict::Dropped));
        assert_eq!(waiter.join().unwrap(), Ok(FrameVerdict::Flagged));
    }

    #[test]
    fn test_missing_targets_touch_nothing() {
        let sync = coordinator(&[A], 100);
        let request = SyncRequest::default();
        assert_eq!(
            sync.check_result(A, &request, &CaptureResult::new(1)),
            Err(SyncError::MissingField("targets"))
        );
        assert_eq!(sync.enqueue(A, &request), Err(SyncError::MissingField("targets")));
        assert!(sync.waiting(Barrier::Result).is_empty());
    }

    #[test]
    fn test_missing_timestamp_alone_does_not_block() {
        let sync = coordinator(&[A, B], 5000);
        let start = Instant::now();
        let result = sync.check_result(A, &SyncRequest::new([B]), &CaptureResult::default());
        assert_eq!(result, Err(SyncError::MissingField("timestamp_ns")));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(sync.waiting(Barrier::Result).is_empty());
    }

    #[test]
    fn test_missing_timestamp_first_leaves_late_peer_to_time_out() {
        let sync = coordinator(&[A, B], 30);
        assert_eq!(
            sync.check_result(A, &SyncRequest::new([B]), &CaptureResult::default()),
            Err(SyncError::MissingField("timestamp_ns"))
        );
        assert_eq!(sync.last_timestamp_ns(A), None);

        let err = sync.check_timestamps(B, &[A], 1_000, 100).unwrap_err();
        assert!(matches!(
            err,
            SyncError::BarrierTimeout { participant: B, barrier: Barrier::Result, .. }
        ));
        assert!(sync.waiting(Barrier::Result).is_empty());
    }

    #[test]
    fn test_stop_racing_release_never_strands_waiter() {
        for _ in 0..200 {
            let sync = coordinator(&[A, C], 5000);
            let waiter = {
                let sync = Arc::clone(&sync);
                thread::spawn(move || {
                    let start = Instant::now();
                    (sync.arrive(A, &[C]), start.elapsed())
                })
            };
            wait_until_parked(&sync, Barrier::Enqueue, 1);

            let releaser = {
                let sync = Arc::clone(&sync);
                thread::spawn(move || sync.arrive(C, &[A]))
            };
            sync.stop(A).unwrap();

            let (result, waited) = waiter.join().unwrap();
            assert!(
                matches!(result, Ok(ArrivalRole::Waited) | Err(SyncError::Stopped(A))),
                "{result:?}"
            );
            assert!(waited < Duration::from_secs(1));

            // C either released A or found it already stopped.
            let released = releaser.join().unwrap();
            assert!(
                matches!(
                    released,
                    Ok(ArrivalRole::Released)
                        | Err(SyncError::PeerStopped { participant: C, peer: A })
                ),
                "{released:?}"
            );
        }
    }

    #[test]
    fn test_arrival_after_stop_is_rejected() {
        let sync = coordinator(&[A, B], 5000);
        let ctx = sync.context(A).unwrap();
        sync.stop(A).unwrap();
        assert!(ctx.is_stopped());
        assert_eq!(sync.arrive(A, &[B]), Err(SyncError::NotStarted(A)));
        assert!(sync.waiting(Barrier::Enqueue).is_empty());
    }

    #[test]
    fn test_stop_pulls_waiters_that_target_it() {
        let sync = Arc::new(SyncCoordinator::new(SyncConfig::unbounded()));
        for id in [A, B, C] {
            sync.start(id).unwrap();
        }
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.check_timestamps(A, &[B, C], 0, 100))
        };
        wait_until_parked(&sync, Barrier::Result, 1);

        sync.stop(B).unwrap();
        assert_eq!(
            waiter.join().unwrap(),
            Err(SyncError::PeerStopped { participant: A, peer: B })
        );
        assert!(sync.waiting(Barrier::Result).is_empty());

        // Later arrivals fail fast instead of parking forever.
        assert_eq!(
            sync.arrive(C, &[A, B]),
            Err(SyncError::PeerStopped { participant: C, peer: B })
        );

        // A restart makes the peer reachable again.
        sync.start(B).unwrap();
        assert_eq!(sync.arrive(B, &[]), Ok(ArrivalRole::Released));
        assert!(sync.waiting(Barrier::Enqueue).is_empty());
    }

    #[test]
    fn test_stop_leaves_unrelated_waiters_parked() {
        let sync = coordinator(&[A, B, C], 5000);
        let waiter = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.arrive(A, &[B]))
        };
        wait_until_parked(&sync, Barrier::Enqueue, 1);

        sync.stop(C).unwrap();
        assert_eq!(sync.waiting(Barrier::Enqueue), vec![A]);
        assert_eq!(sync.arrive(B, &[A]), Ok(ArrivalRole::Released));
        assert_eq!(waiter.join().unwrap(), Ok(ArrivalRole::Waited));
    }
}
