// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection table for framed client sockets.
//!
//! Combines the runtime primitives the way a network front end uses them:
//! a [`SlotAllocator`] maps socket descriptors to stable slots, each slot
//! owns a [`StreamAssembler`], and all assemblers share one [`BufferPool`].
//!
//! ```rust
//! use hive::alloc::SystemAlloc;
//! use hive::config::RuntimeConfig;
//! use hive::gate::Gate;
//!
//! let mut gate = Gate::new(&RuntimeConfig::new().max_connections(4), SystemAlloc::shared()).unwrap();
//! gate.open(17).unwrap();
//! assert!(gate.feed(17, vec![0x00, 0x02, b'h']).unwrap().is_empty());
//! assert_eq!(gate.feed(17, vec![b'i']).unwrap(), vec![b"hi".to_vec()]);
//! gate.close(17);
//! ```

use crate::alloc::RawAlloc;
use crate::config::RuntimeConfig;
use crate::core::rt::{BufferPool, HeaderWidth, SlotAllocator, StreamAssembler};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Per-descriptor connection table with frame reassembly.
#[derive(Debug)]
pub struct Gate {
    slots: SlotAllocator,
    conns: Vec<StreamAssembler>,
    pool: BufferPool,
    header: HeaderWidth,
}

impl Gate {
    pub fn new(config: &RuntimeConfig, alloc: Arc<dyn RawAlloc>) -> Result<Self> {
        config.validate()?;
        let slots = SlotAllocator::new(config.max_connections, alloc.clone())?;
        let conns = (0..config.max_connections)
            .map(|_| StreamAssembler::new())
            .collect();
        Ok(Self {
            slots,
            conns,
            pool: BufferPool::with_block_size(config.pool_block_size, alloc),
            header: config.header_width,
        })
    }

    /// Register a descriptor and return its slot.
    pub fn open(&mut self, fd: u32) -> Result<usize> {
        if self.slots.lookup(fd).is_some() {
            return Err(Error::DuplicateConnection(fd));
        }
        if self.slots.is_full() {
            return Err(Error::ConnectionLimit(self.slots.capacity()));
        }
        let slot = self.slots.insert(fd);
        debug_assert!(self.conns[slot].is_empty());
        log::debug!("[gate] open fd={} slot={}", fd, slot);
        Ok(slot)
    }

    /// Buffer bytes received on `fd` and return every frame now complete.
    pub fn feed(&mut self, fd: u32, data: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        let slot = self.slots.lookup(fd).ok_or(Error::UnknownConnection(fd))?;
        let conn = &mut self.conns[slot];
        conn.push(&mut self.pool, data)?;

        let mut frames = Vec::new();
        while let Some(frame) = conn.read_message(&mut self.pool, self.header) {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Drop `fd`, returning its buffered chunks to the pool. Returns the freed slot.
    pub fn close(&mut self, fd: u32) -> Option<usize> {
        let slot = self.slots.remove(fd)?;
        self.conns[slot].clear(&mut self.pool);
        log::debug!("[gate] close fd={} slot={}", fd, slot);
        Some(slot)
    }

    pub fn slot(&self, fd: u32) -> Option<usize> {
        self.slots.lookup(fd)
    }

    pub fn fd_at(&self, slot: usize) -> Option<u32> {
        self.slots.id_at(slot)
    }

    /// Bytes buffered for `fd` and not yet returned as a frame.
    pub fn buffered(&self, fd: u32) -> Option<usize> {
        self.slots.lookup(fd).map(|slot| self.conns[slot].len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    pub fn header_width(&self) -> HeaderWidth {
        self.header
    }

    /// Shared chunk pool, for inspection.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        for conn in &mut self.conns {
            conn.clear(&mut self.pool);
        }
    }
}
