// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Raw allocator interface.
//!
//! Every pool block, slot array, hash bucket array and timer node is charged
//! against a [`RawAlloc`] before it is created and credited back when it is
//! released. The host installs whichever policy it needs: [`SystemAlloc`]
//! only counts, [`BudgetAlloc`] enforces a hard limit and emits a warning
//! each time usage doubles past its report threshold.
//!
//! The Rust global allocator still performs the memory operation itself;
//! this trait is the permission and accounting seam in front of it.

use crate::config::MEMORY_WARNING_REPORT;
use crate::error::{Error, Result};
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pluggable allocate/free pair.
pub trait RawAlloc: Send + Sync + Debug {
    /// Charge `size` bytes. On error nothing is charged.
    fn alloc(&self, size: usize) -> Result<()>;

    /// Credit `size` bytes previously charged with [`RawAlloc::alloc`].
    fn free(&self, size: usize);

    /// Bytes currently charged.
    fn in_use(&self) -> usize;
}

/// Default allocator: tracks usage, never refuses.
#[derive(Debug, Default)]
pub struct SystemAlloc {
    mem: AtomicUsize,
}

impl SystemAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared instance ready to hand to pools and wheels.
    pub fn shared() -> Arc<dyn RawAlloc> {
        Arc::new(Self::new())
    }
}

impl RawAlloc for SystemAlloc {
    fn alloc(&self, size: usize) -> Result<()> {
        self.mem.fetch_add(size, Ordering::Relaxed);
        Ok(())
    }

    fn free(&self, size: usize) {
        self.mem.fetch_sub(size, Ordering::Relaxed);
    }

    fn in_use(&self) -> usize {
        self.mem.load(Ordering::Relaxed)
    }
}

/// Budget-tracked allocator.
///
/// A limit of 0 means unlimited. The report threshold starts at
/// `warning` bytes and doubles every time usage crosses it.
#[derive(Debug)]
pub struct BudgetAlloc {
    mem: AtomicUsize,
    limit: AtomicUsize,
    report: AtomicUsize,
}

impl BudgetAlloc {
    /// Create a budget with a hard limit and the default 32 MiB report threshold.
    pub fn with_limit(limit: usize) -> Self {
        Self::new(limit, MEMORY_WARNING_REPORT)
    }

    pub fn new(limit: usize, warning: usize) -> Self {
        Self {
            mem: AtomicUsize::new(0),
            limit: AtomicUsize::new(limit),
            report: AtomicUsize::new(warning.max(1)),
        }
    }

    /// Change the hard limit. Usage already above the new limit is kept;
    /// only further growth is refused.
    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Relaxed);
        if limit != 0 {
            log::info!(
                "[alloc] Set memory limit to {:.2} M",
                limit as f64 / (1024.0 * 1024.0)
            );
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    /// Current report threshold.
    pub fn report_threshold(&self) -> usize {
        self.report.load(Ordering::Relaxed)
    }

    fn maybe_report(&self, mem: usize) {
        let mut report = self.report.load(Ordering::Relaxed);
        while mem > report {
            match self.report.compare_exchange_weak(
                report,
                report.saturating_mul(2),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    log::warn!(
                        "[alloc] Memory warning {:.2} M",
                        mem as f64 / (1024.0 * 1024.0)
                    );
                    return;
                }
                Err(current) => report = current,
            }
        }
    }
}

impl RawAlloc for BudgetAlloc {
    fn alloc(&self, size: usize) -> Result<()> {
        let limit = self.limit.load(Ordering::Relaxed);
        let updated = self
            .mem
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |mem| {
                let next = mem.checked_add(size)?;
                if limit != 0 && next > limit {
                    None
                } else {
                    Some(next)
                }
            });

        match updated {
            Ok(prev) => {
                self.maybe_report(prev + size);
                Ok(())
            }
            Err(in_use) if in_use.checked_add(size).is_none() => {
                Err(Error::OutOfMemory { requested: size })
            }
            Err(in_use) => Err(Error::MemoryLimitExceeded {
                limit,
                in_use,
                requested: size,
            }),
        }
    }

    fn free(&self, size: usize) {
        let prev = self.mem.fetch_sub(size, Ordering::AcqRel);
        debug_assert!(prev >= size, "freed {} bytes with only {} charged", size, prev);
    }

    fn in_use(&self) -> usize {
        self.mem.load(Ordering::Acquire)
    }
}
