//! Integration tests for the rendezvous barriers and timestamp checks.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use framelock_sync::{
    ArrivalRole, Barrier, CaptureResult, FailHandling, FrameVerdict, ParticipantId, SyncConfig,
    SyncCoordinator, SyncError, SyncRequest,
};

const A: ParticipantId = ParticipantId(0);
const B: ParticipantId = ParticipantId(1);
const C: ParticipantId = ParticipantId(2);

fn session(ids: &[ParticipantId]) -> Arc<SyncCoordinator> {
    let sync = Arc::new(SyncCoordinator::new(SyncConfig {
        barrier_timeout_ms: Some(5000),
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
        assert!(Instant::now() < deadline, "participants never parked");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_three_way_barrier_last_arriver_releases() {
    let sync = session(&[A, B, C]);

    let a = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || sync.arrive(A, &[B, C]))
    };
    wait_until_parked(&sync, Barrier::Enqueue, 1);

    let b = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || sync.arrive(B, &[A, C]))
    };
    wait_until_parked(&sync, Barrier::Enqueue, 2);
    assert_eq!(sync.waiting(Barrier::Enqueue), vec![A, B]);

    let start = Instant::now();
    assert_eq!(sync.arrive(C, &[A, B]), Ok(ArrivalRole::Released));
    assert!(start.elapsed() < Duration::from_secs(1));

    assert_eq!(a.join().unwrap(), Ok(ArrivalRole::Waited));
    assert_eq!(b.join().unwrap(), Ok(ArrivalRole::Waited));
    assert!(sync.waiting(Barrier::Enqueue).is_empty());
}

#[test]
fn test_asymmetric_targets() {
    // A only cares about B; B cares about nobody and passes straight through.
    let sync = session(&[A, B]);
    assert_eq!(sync.arrive(B, &[]), Ok(ArrivalRole::Released));

    let a = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || sync.arrive(A, &[B]))
    };
    wait_until_parked(&sync, Barrier::Enqueue, 1);
    assert_eq!(sync.arrive(B, &[A]), Ok(ArrivalRole::Released));
    assert_eq!(a.join().unwrap(), Ok(ArrivalRole::Waited));
}

fn check_pair(sync: &Arc<SyncCoordinator>, tolerance_us: i64) -> (bool, bool) {
    let a = {
        let sync = Arc::clone(sync);
        thread::spawn(move || sync.check_timestamps(A, &[B], 1_000_000_000, tolerance_us))
    };
    wait_until_parked(sync, Barrier::Result, 1);
    let b = sync
        .check_timestamps(B, &[A], 1_000_050_000, tolerance_us)
        .unwrap();
    (a.join().unwrap().unwrap(), b)
}

#[test]
fn test_result_check_against_tolerance() {
    let sync = session(&[A, B]);

    // 50us apart.
    assert_eq!(check_pair(&sync, 100), (true, true));
    assert_eq!(check_pair(&sync, 10), (false, false));
    assert_eq!(check_pair(&sync, 50), (true, true));
}

#[test]
fn test_missing_timestamp_releases_waiting_peer() {
    let sync = session(&[A, B]);

    let a = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || {
            sync.check_result(A, &SyncRequest::new([B]), &CaptureResult::new(1_000_000_000))
        })
    };
    wait_until_parked(&sync, Barrier::Result, 1);

    let start = Instant::now();
    assert_eq!(
        sync.check_result(B, &SyncRequest::new([A]), &CaptureResult::default()),
        Err(SyncError::MissingField("timestamp_ns"))
    );
    assert!(start.elapsed() < Duration::from_secs(1));

    // A is not stranded; it sees B's missing timestamp as a mismatch.
    assert_eq!(a.join().unwrap(), Ok(FrameVerdict::Flagged));
    assert!(sync.waiting(Barrier::Result).is_empty());
}

#[test]
fn test_request_defaults_come_from_config() {
    let sync = Arc::new(SyncCoordinator::new(SyncConfig {
        barrier_timeout_ms: Some(5000),
        default_tolerance_us: 10,
        default_fail_handling: FailHandling::Drop,
    }));
    sync.start(A).unwrap();
    sync.start(B).unwrap();

    let a = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || {
            sync.check_result(A, &SyncRequest::new([B]), &CaptureResult::new(0))
        })
    };
    wait_until_parked(&sync, Barrier::Result, 1);

    // Per-request tolerance overrides the config for B only.
    let relaxed = SyncRequest::new([A]).with_tolerance_us(1000);
    assert_eq!(
        sync.check_result(B, &relaxed, &CaptureResult::new(500_000)),
        Ok(FrameVerdict::Synced)
    );
    assert_eq!(a.join().unwrap(), Ok(FrameVerdict::Dropped));
}

#[test]
fn test_absent_peer_times_out_without_blocking_others() {
    let sync = Arc::new(SyncCoordinator::new(SyncConfig {
        barrier_timeout_ms: Some(30),
        ..SyncConfig::default()
    }));
    sync.start(A).unwrap();
    sync.start(B).unwrap();
    sync.start(C).unwrap();

    // C never shows up.
    let err = sync.arrive(A, &[C]).unwrap_err();
    assert!(matches!(err, SyncError::BarrierTimeout { participant: A, .. }));

    // A's timed-out arrival left no trace: B does not count it as present.
    assert!(sync.waiting(Barrier::Enqueue).is_empty());
    let err = sync.arrive(B, &[A]).unwrap_err();
    assert!(matches!(err, SyncError::BarrierTimeout { participant: B, .. }));
    assert!(sync.waiting(Barrier::Enqueue).is_empty());
}

#[test]
fn test_fail_handling_decode_is_closed() {
    assert_eq!(FailHandling::try_from(0), Ok(FailHandling::Continue));
    assert_eq!(FailHandling::try_from(1), Ok(FailHandling::Drop));
    assert_eq!(FailHandling::try_from(2), Err(SyncError::InvalidFailHandling(2)));
    assert_eq!(FailHandling::try_from(-1), Err(SyncError::InvalidFailHandling(-1)));
}
