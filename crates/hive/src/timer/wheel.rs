// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hierarchical timing wheel.
//!
//! A near ring of 256 slots resolves the low 8 bits of the absolute tick
//! counter; four level rings of 64 slots each resolve the next 6-bit runs.
//! A timer sits in the finest ring whose higher-order bits agree with the
//! current tick, and is re-classified one ring down whenever the
//! corresponding bit run of the tick counter rolls over.
//!
//! ```text
//!  tick: | level 3 | level 2 | level 1 | level 0 |  near  |
//!  bits: |  31..26 |  25..20 |  19..14 |  13..8  |  7..0  |
//! ```
//!
//! Timer nodes live in an index-addressed arena; rings hold head/tail
//! indices. Expired entries are collected under the lock and delivered
//! after it is released, so a slow or re-entrant mailbox never blocks
//! concurrent `timeout` callers.

use crate::alloc::RawAlloc;
use crate::config::{
    TIME_LEVEL, TIME_LEVELS, TIME_LEVEL_MASK, TIME_LEVEL_SHIFT, TIME_NEAR, TIME_NEAR_MASK,
    TIME_NEAR_SHIFT,
};
use crate::error::Result;
use crate::mailbox::{Dispatcher, Handle, Message, Session};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Who to notify when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerEvent {
    handle: Handle,
    session: Session,
}

#[derive(Debug)]
struct TimerNode {
    next: Option<u32>,
    expire: u32,
    event: TimerEvent,
}

/// Bytes charged to the allocator per pending timer.
const NODE_BYTES: usize = std::mem::size_of::<TimerNode>();

#[derive(Debug, Clone, Copy)]
struct LinkList {
    head: Option<u32>,
    tail: Option<u32>,
}

impl LinkList {
    const EMPTY: LinkList = LinkList {
        head: None,
        tail: None,
    };

    /// Detach the whole chain and return its head.
    fn take(&mut self) -> Option<u32> {
        let head = self.head;
        *self = Self::EMPTY;
        head
    }
}

fn link(nodes: &mut [TimerNode], list: &mut LinkList, idx: u32) {
    nodes[idx as usize].next = None;
    match list.tail {
        Some(tail) => nodes[tail as usize].next = Some(idx),
        None => list.head = Some(idx),
    }
    list.tail = Some(idx);
}

struct WheelState {
    near: [LinkList; TIME_NEAR],
    levels: [[LinkList; TIME_LEVEL]; TIME_LEVELS],
    time: u32,
    nodes: Vec<TimerNode>,
    free: Option<u32>,
    pending: usize,
}

impl WheelState {
    fn new(time: u32) -> Self {
        Self {
            near: [LinkList::EMPTY; TIME_NEAR],
            levels: [[LinkList::EMPTY; TIME_LEVEL]; TIME_LEVELS],
            time,
            nodes: Vec::new(),
            free: None,
            pending: 0,
        }
    }

    fn alloc_node(&mut self, expire: u32, event: TimerEvent) -> u32 {
        let node = TimerNode {
            next: None,
            expire,
            event,
        };
        match self.free {
            Some(idx) => {
                self.free = self.nodes[idx as usize].next;
                self.nodes[idx as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn free_node(&mut self, idx: u32) {
        self.nodes[idx as usize].next = self.free;
        self.free = Some(idx);
    }

    /// Link `idx` into the finest ring that shares its expiry's high bits.
    fn add_node(&mut self, idx: u32) {
        let expire = self.nodes[idx as usize].expire;
        let current = self.time;

        let list = if (expire | TIME_NEAR_MASK) == (current | TIME_NEAR_MASK) {
            &mut self.near[(expire & TIME_NEAR_MASK) as usize]
        } else {
            let mut mask: u64 = (TIME_NEAR as u64) << TIME_LEVEL_SHIFT;
            let mut level = 0;
            while level < TIME_LEVELS - 1 {
                let low = (mask - 1) as u32;
                if (expire | low) == (current | low) {
                    break;
                }
                mask <<= TIME_LEVEL_SHIFT;
                level += 1;
            }
            let shift = TIME_NEAR_SHIFT + level as u32 * TIME_LEVEL_SHIFT;
            &mut self.levels[level][((expire >> shift) & TIME_LEVEL_MASK) as usize]
        };
        link(&mut self.nodes, list, idx);
    }

    /// Re-classify every node of one level slot.
    fn move_list(&mut self, level: usize, slot: usize) {
        let mut cursor = self.levels[level][slot].take();
        while let Some(idx) = cursor {
            cursor = self.nodes[idx as usize].next;
            self.add_node(idx);
        }
    }

    /// Advance one tick and cascade whichever level just rolled over.
    fn shift(&mut self) {
        self.time = self.time.wrapping_add(1);
        let ct = self.time;
        if ct == 0 {
            self.move_list(TIME_LEVELS - 1, 0);
            return;
        }

        let mut mask: u64 = TIME_NEAR as u64;
        let mut time = ct >> TIME_NEAR_SHIFT;
        let mut level = 0;
        while u64::from(ct) & (mask - 1) == 0 {
            let slot = (time & TIME_LEVEL_MASK) as usize;
            if slot != 0 {
                self.move_list(level, slot);
                break;
            }
            mask <<= TIME_LEVEL_SHIFT;
            time >>= TIME_LEVEL_SHIFT;
            level += 1;
        }
    }

    /// Unlink the current near slot, free its nodes and return their events.
    fn drain_current(&mut self) -> Vec<TimerEvent> {
        let slot = (self.time & TIME_NEAR_MASK) as usize;
        let mut cursor = self.near[slot].take();
        let mut events = Vec::new();
        while let Some(idx) = cursor {
            let node = &self.nodes[idx as usize];
            cursor = node.next;
            events.push(node.event);
            self.free_node(idx);
        }
        self.pending -= events.len();
        events
    }

    fn current_slot_ready(&self) -> bool {
        self.near[(self.time & TIME_NEAR_MASK) as usize]
            .head
            .is_some()
    }
}

/// Timer scheduler turning relative timeouts into mailbox deliveries.
pub struct TimingWheel {
    state: Mutex<WheelState>,
    dispatcher: Arc<dyn Dispatcher>,
    alloc: Arc<dyn RawAlloc>,
}

impl TimingWheel {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, alloc: Arc<dyn RawAlloc>) -> Self {
        Self::starting_at(0, dispatcher, alloc)
    }

    /// Wheel whose tick counter starts at `tick` instead of 0.
    pub(crate) fn starting_at(
        tick: u32,
        dispatcher: Arc<dyn Dispatcher>,
        alloc: Arc<dyn RawAlloc>,
    ) -> Self {
        Self {
            state: Mutex::new(WheelState::new(tick)),
            dispatcher,
            alloc,
        }
    }

    /// Deliver an empty response tagged `session` to `handle` after `delay` ticks.
    ///
    /// A delay of 0 or less is delivered immediately, bypassing the wheel;
    /// in that case a dead target is reported as `ActorNotFound`. Returns
    /// `session` on success.
    pub fn timeout(&self, handle: Handle, delay: i32, session: Session) -> Result<Session> {
        if delay <= 0 {
            self.dispatcher.push(handle, Message::response(session))?;
            return Ok(session);
        }

        self.alloc.alloc(NODE_BYTES)?;
        let mut state = self.state.lock();
        let expire = state.time.wrapping_add(delay as u32);
        let idx = state.alloc_node(expire, TimerEvent { handle, session });
        state.add_node(idx);
        state.pending += 1;
        Ok(session)
    }

    /// Advance the wheel by one tick, delivering everything that expires.
    pub fn update(&self) {
        let mut state = self.state.lock();

        // Entries landing on the current slot after it was drained (rare)
        self.execute(&mut state);

        state.shift();
        self.execute(&mut state);
    }

    fn execute(&self, state: &mut MutexGuard<'_, WheelState>) {
        while state.current_slot_ready() {
            let events = state.drain_current();
            MutexGuard::unlocked(state, || self.dispatch(&events));
        }
    }

    fn dispatch(&self, events: &[TimerEvent]) {
        for event in events {
            if let Err(e) = self
                .dispatcher
                .push(event.handle, Message::response(event.session))
            {
                log::debug!(
                    "[timer] dropped session {} for :{:08x}: {}",
                    event.session,
                    event.handle,
                    e
                );
            }
            self.alloc.free(NODE_BYTES);
        }
    }

    /// Current absolute tick.
    pub fn tick(&self) -> u32 {
        self.state.lock().time
    }

    /// Timers inserted and not yet fired.
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }
}

impl std::fmt::Debug for TimingWheel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimingWheel")
            .field("tick", &state.time)
            .field("pending", &state.pending)
            .finish()
    }
}

impl Drop for TimingWheel {
    fn drop(&mut self) {
        let pending = self.state.get_mut().pending;
        if pending > 0 {
            log::debug!("[timer] dropping wheel with {} pending timers", pending);
            self.alloc.free(pending * NODE_BYTES);
        }
    }
}
