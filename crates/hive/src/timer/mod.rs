// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timeout scheduling.
//!
//! [`Timer`] bundles the [`TimingWheel`] with the [`Clock`] that drives it.
//! Build one at startup, share it by `Arc` with every actor that needs
//! timeouts, and hand a clone to [`spawn_timer_thread`].
//!
//! ```rust
//! use hive::alloc::SystemAlloc;
//! use hive::mailbox::ActorRegistry;
//! use hive::timer::Timer;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ActorRegistry::new());
//! let (actor, inbox) = registry.register();
//! let timer = Timer::new(registry.clone(), SystemAlloc::shared());
//!
//! // A zero delay is delivered straight away
//! timer.timeout(actor, 0, 7).unwrap();
//! assert_eq!(inbox.try_recv().unwrap().session, 7);
//! ```

pub mod clock;
pub mod driver;
pub mod wheel;

pub use clock::{thread_time, Clock, ManualTimeSource, SystemTimeSource, TimeSource};
pub use driver::{spawn_timer_thread, TimerThread};
pub use wheel::TimingWheel;

use crate::alloc::RawAlloc;
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::mailbox::{Dispatcher, Handle, Session};
use std::sync::Arc;

/// Timing wheel plus its driving clock.
#[derive(Debug)]
pub struct Timer {
    wheel: TimingWheel,
    clock: Clock,
}

impl Timer {
    /// Timer on the operating system clocks.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, alloc: Arc<dyn RawAlloc>) -> Self {
        Self::with_source(dispatcher, alloc, Arc::new(SystemTimeSource))
    }

    pub fn with_source(
        dispatcher: Arc<dyn Dispatcher>,
        alloc: Arc<dyn RawAlloc>,
        source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            wheel: TimingWheel::new(dispatcher, alloc),
            clock: Clock::new(source),
        }
    }

    /// Deliver a response tagged `session` to `handle` after `delay`
    /// centiseconds (immediately if `delay <= 0`).
    pub fn timeout(&self, handle: Handle, delay: i32, session: Session) -> Result<Session> {
        self.wheel.timeout(handle, delay, session)
    }

    /// Sample the clock and advance the wheel; returns ticks advanced.
    pub fn update_time(&self) -> u32 {
        self.clock.update(&self.wheel)
    }

    /// Centiseconds since start.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Wall-clock seconds at start.
    pub fn start_time(&self) -> u32 {
        self.clock.start_time()
    }

    /// Timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.wheel.pending()
    }

    /// Start the driver thread at `config.timer_interval`.
    pub fn spawn_driver(self: &Arc<Self>, config: &RuntimeConfig) -> Result<TimerThread> {
        config.validate()?;
        spawn_timer_thread(self.clone(), config.timer_interval)
    }

    pub fn wheel(&self) -> &TimingWheel {
        &self.wheel
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
