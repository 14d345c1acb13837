// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dedicated timer thread.
//!
//! Calls [`Timer::update_time`] every `interval` until the returned handle
//! is dropped or stopped.

use super::Timer;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a running timer thread.
///
/// When dropped, signals the background thread to stop and joins it.
pub struct TimerThread {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerThread {
    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::debug!("[timer-thread] thread panicked");
            }
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the thread that drives `timer`.
pub fn spawn_timer_thread(timer: Arc<Timer>, interval: Duration) -> Result<TimerThread> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let thread = std::thread::Builder::new()
        .name("hive-timer".to_string())
        .spawn(move || {
            log::debug!("[timer-thread] Started with interval {:?}", interval);
            while !stop_flag.load(Ordering::Acquire) {
                timer.update_time();
                std::thread::sleep(interval);
            }
            log::debug!("[timer-thread] Stopped at tick {}", timer.now());
        })?;

    Ok(TimerThread {
        stop,
        thread: Some(thread),
    })
}
