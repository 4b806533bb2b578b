//! # Buffer Set Benchmark
//!
//! Per-frame cost of the acquire / mark / release cycle.
//!
//! Measures:
//! 1. One frame through a four-stage pipeline on four streams
//! 2. The acquire gate alone on a deep users registry

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use framelock_core::{
    BufferSet, FreeListPool, SharedBuffer, StreamId, UserCategory, UserId, UserStatus,
    UsersRegistry,
};

const STREAMS: u64 = 4;
const STAGES: u64 = 4;

fn build_frame(pool: &Arc<FreeListPool<u64>>, frame_no: u32) -> BufferSet<u64> {
    let set = BufferSet::new(frame_no, frame_no);
    for stream in 0..STREAMS {
        let handle = pool.acquire().unwrap();
        let mut buffer = SharedBuffer::new(StreamId(stream), pool.name(), handle, pool);
        buffer.register_user(UserId(0), UserCategory::Producer).unwrap();
        for stage in 1..STAGES {
            buffer.register_user(UserId(stage), UserCategory::Consumer).unwrap();
        }
        set.add(buffer).unwrap();
    }
    set
}

fn bench_frame_cycle(c: &mut Criterion) {
    let pool = Arc::new(FreeListPool::new("bench", (0..STREAMS).collect()));
    let mut frame_no = 0_u32;

    c.bench_function("frame_cycle_4_streams_4_stages", |b| {
        b.iter(|| {
            frame_no = frame_no.wrapping_add(1);
            let set = build_frame(&pool, frame_no);
            for stage in 0..STAGES {
                let user = UserId(stage);
                for stream in 0..STREAMS {
                    black_box(set.get_buffer(StreamId(stream), user));
                    let _ = set.mark_user_status(StreamId(stream), user, UserStatus::USED);
                }
                set.apply_release(user);
            }
            black_box(set.live_count())
        });
    });
}

fn bench_acquire_gate(c: &mut Criterion) {
    let mut users = UsersRegistry::new();
    for id in 0..64 {
        users.register(UserId(id), UserCategory::Consumer).unwrap();
    }
    for id in 0..63 {
        let _ = users.mark_status(UserId(id), UserStatus::PRE_RELEASED);
    }

    c.bench_function("acquire_gate_64_users", |b| {
        b.iter(|| black_box(users.all_users_released_or_pre_released(black_box(UserId(63)))));
    });
}

criterion_group!(benches, bench_frame_cycle, bench_acquire_gate);
criterion_main!(benches);
