// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Centisecond clock driving the timing wheel.
//!
//! The monotonic source is sampled once per driver cycle and the wheel is
//! advanced by exactly the number of centiseconds elapsed since the
//! previous sample. A backward jump is logged and the stored sample is
//! resynchronized; no ticks are replayed or rolled back.

use super::wheel::TimingWheel;
use crate::config::TICKS_PER_SECOND;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const NANOS_PER_TICK: u64 = 1_000_000_000 / TICKS_PER_SECOND;

/// Where the clock reads time from.
pub trait TimeSource: Send + Sync {
    /// Monotonic time in centiseconds from an arbitrary origin.
    fn monotonic_cs(&self) -> u64;

    /// Wall clock as (seconds since the Unix epoch, centisecond fraction).
    fn wall(&self) -> (u32, u32);
}

/// Raw clock_gettime call, in nanoseconds.
#[cfg(unix)]
fn clock_gettime_ns(clockid: libc::clockid_t) -> io::Result<u64> {
    // SAFETY:
    // - timespec is a POD type that can be safely zero-initialized
    // - tv_sec and tv_nsec have no invalid bit patterns
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY:
    // - clockid is one of the standard clock IDs defined by libc
    // - &mut ts is a valid pointer to a properly sized timespec struct
    let ret = unsafe { libc::clock_gettime(clockid, &mut ts) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

/// Operating system clocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[cfg(unix)]
    fn monotonic_cs(&self) -> u64 {
        // CLOCK_MONOTONIC cannot fail with a valid timespec pointer
        clock_gettime_ns(libc::CLOCK_MONOTONIC).unwrap_or(0) / NANOS_PER_TICK
    }

    #[cfg(not(unix))]
    fn monotonic_cs(&self) -> u64 {
        use std::sync::OnceLock;
        use std::time::Instant;

        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        let origin = *ORIGIN.get_or_init(Instant::now);
        (origin.elapsed().as_nanos() / u128::from(NANOS_PER_TICK)) as u64
    }

    fn wall(&self) -> (u32, u32) {
        use std::time::{SystemTime, UNIX_EPOCH};

        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => (
                d.as_secs() as u32,
                d.subsec_nanos() / NANOS_PER_TICK as u32,
            ),
            Err(_) => (0, 0),
        }
    }
}

/// Hand-driven time source for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    mono: AtomicU64,
    wall_sec: AtomicU32,
    wall_cs: AtomicU32,
}

impl ManualTimeSource {
    pub fn new(mono_cs: u64) -> Self {
        Self {
            mono: AtomicU64::new(mono_cs),
            ..Self::default()
        }
    }

    pub fn with_wall(self, sec: u32, cs: u32) -> Self {
        self.wall_sec.store(sec, Ordering::Relaxed);
        self.wall_cs.store(cs, Ordering::Relaxed);
        self
    }

    pub fn advance(&self, cs: u64) {
        self.mono.fetch_add(cs, Ordering::AcqRel);
    }

    /// Jump to an absolute reading, backwards included.
    pub fn set(&self, cs: u64) {
        self.mono.store(cs, Ordering::Release);
    }
}

impl TimeSource for ManualTimeSource {
    fn monotonic_cs(&self) -> u64 {
        self.mono.load(Ordering::Acquire)
    }

    fn wall(&self) -> (u32, u32) {
        (
            self.wall_sec.load(Ordering::Relaxed),
            self.wall_cs.load(Ordering::Relaxed),
        )
    }
}

/// Logical clock in centiseconds.
///
/// Meant to be driven by one timer thread; a second concurrent sampler
/// never double-counts elapsed time. `now` and `start_time` may be read
/// from anywhere.
pub struct Clock {
    source: Arc<dyn TimeSource>,
    start_time: u32,
    current: AtomicU64,
    current_point: AtomicU64,
}

impl Clock {
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        let (sec, cs) = source.wall();
        let point = source.monotonic_cs();
        Self {
            source,
            start_time: sec,
            current: AtomicU64::new(u64::from(cs)),
            current_point: AtomicU64::new(point),
        }
    }

    /// Clock backed by the operating system.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemTimeSource))
    }

    /// Read the monotonic source and return the centiseconds elapsed since
    /// the previous sample (0 after a backward jump).
    ///
    /// Concurrent samplers race on `current_point`; only the one that moves
    /// it claims the interval, the others see 0.
    pub fn sample(&self) -> u32 {
        let cp = self.source.monotonic_cs();
        let prev = self.current_point.load(Ordering::Acquire);
        if cp == prev {
            return 0;
        }
        if self
            .current_point
            .compare_exchange(prev, cp, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        if cp < prev {
            log::warn!("[clock] time diff error: change from {} to {}", prev, cp);
            return 0;
        }
        let diff = u32::try_from(cp - prev).unwrap_or_else(|_| {
            log::warn!(
                "[clock] gap of {} cs exceeds one wheel revolution, clamped",
                cp - prev
            );
            u32::MAX
        });
        self.current.fetch_add(u64::from(diff), Ordering::AcqRel);
        diff
    }

    /// Sample and advance `wheel` one tick per elapsed centisecond.
    pub fn update(&self, wheel: &TimingWheel) -> u32 {
        let diff = self.sample();
        for _ in 0..diff {
            wheel.update();
        }
        diff
    }

    /// Centiseconds since start, seeded with the start time's fraction.
    pub fn now(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Wall-clock seconds at construction.
    pub fn start_time(&self) -> u32 {
        self.start_time
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("start_time", &self.start_time)
            .field("now", &self.now())
            .finish()
    }
}

/// CPU time consumed by the calling thread, in microseconds.
///
/// Returns 0 where the platform offers no per-thread clock.
#[cfg(unix)]
pub fn thread_time() -> u64 {
    clock_gettime_ns(libc::CLOCK_THREAD_CPUTIME_ID).map_or(0, |ns| ns / 1_000)
}

#[cfg(not(unix))]
pub fn thread_time() -> u64 {
    0
}
