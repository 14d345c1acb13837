// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitive micro-benchmarks.
//!
//! Measures the per-operation cost of the hot paths a network front end
//! and the timer thread hit on every event:
//! - chunk push/read through a shared buffer pool
//! - descriptor insert/lookup/remove in the slot allocator
//! - timer insertion and per-tick wheel advancement

#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hive::alloc::SystemAlloc;
use hive::mailbox::{Dispatcher, Handle, Message};
use hive::{frame, BufferPool, HeaderWidth, SlotAllocator, StreamAssembler, TimingWheel};
use std::sync::Arc;

/// Dispatcher that discards every delivery.
struct Sink;

impl Dispatcher for Sink {
    fn push(&self, _target: Handle, message: Message) -> hive::Result<()> {
        black_box(message);
        Ok(())
    }
}

fn bench_stream_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_assembly");
    for size in [16usize, 512, 8192] {
        let wire = frame(HeaderWidth::Two, &vec![0xabu8; size]).expect("frame fits");
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            let mut pool = BufferPool::new(SystemAlloc::shared());
            let mut conn = StreamAssembler::new();
            b.iter(|| {
                // Deliver as two fragments to exercise the split path
                let mid = wire.len() / 2;
                conn.push(&mut pool, wire[..mid].to_vec()).expect("push");
                conn.push(&mut pool, wire[mid..].to_vec()).expect("push");
                black_box(conn.read_message(&mut pool, HeaderWidth::Two))
            });
        });
    }
    group.finish();
}

fn bench_slot_allocator(c: &mut Criterion) {
    c.bench_function("slot_insert_lookup_remove", |b| {
        let mut slots = SlotAllocator::new(1024, SystemAlloc::shared()).expect("alloc");
        for fd in 0..512u32 {
            slots.insert(fd * 3);
        }
        let mut fd = 10_000u32;
        b.iter(|| {
            fd = fd.wrapping_add(1);
            let slot = slots.insert(fd);
            black_box(slots.lookup(fd));
            black_box(slots.remove(fd) == Some(slot))
        });
    });
}

fn bench_timing_wheel(c: &mut Criterion) {
    c.bench_function("wheel_timeout", |b| {
        let wheel = TimingWheel::new(Arc::new(Sink), SystemAlloc::shared());
        let mut session = 0i32;
        b.iter(|| {
            session = session.wrapping_add(1);
            wheel
                .timeout(1, 1 + (session & 0xffff), session)
                .expect("schedule")
        });
    });

    c.bench_function("wheel_update_10k_pending", |b| {
        let wheel = TimingWheel::new(Arc::new(Sink), SystemAlloc::shared());
        let mut session = 0i32;
        b.iter(|| {
            // Keep roughly 10k timers in flight spread over 100 s
            while wheel.pending() < 10_000 {
                session = session.wrapping_add(1);
                wheel
                    .timeout(1, 1 + (session % 10_000), session)
                    .expect("schedule");
            }
            wheel.update();
        });
    });
}

criterion_group!(
    benches,
    bench_stream_assembly,
    bench_slot_allocator,
    bench_timing_wheel
);
criterion_main!(benches);
