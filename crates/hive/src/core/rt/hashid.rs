// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity id -> slot table.
//!
//! Maps externally numbered ids (socket descriptors, typically) onto a
//! dense array of `cap` slots. Slot indices are stable for the life of an
//! id, so callers use them directly as offsets into a parallel array.
//!
//! - Insert probes slots linearly from `id % cap` until an empty one is found.
//! - A chained hash index (bucket count = next power of two >= cap, at
//!   least 16) resolves lookups; chains are threaded through the slots.
//!
//! Sized once, never grows. Not synchronized.

use crate::alloc::RawAlloc;
use crate::config::MIN_HASH_BUCKETS;
use crate::error::{Error, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    id: Option<u32>,
    next: Option<u32>,
}

/// Fixed-capacity slot allocator keyed by integer id.
#[derive(Debug)]
pub struct SlotAllocator {
    slots: Vec<Slot>,
    buckets: Vec<Option<u32>>,
    hash_mask: u32,
    count: usize,
    alloc: Arc<dyn RawAlloc>,
}

impl SlotAllocator {
    /// Build a table with room for `max` concurrent ids.
    pub fn new(max: usize, alloc: Arc<dyn RawAlloc>) -> Result<Self> {
        if max == 0 || u32::try_from(max).is_err() {
            return Err(Error::InvalidCapacity(max));
        }
        let bucket_count = max.next_power_of_two().max(MIN_HASH_BUCKETS);
        alloc.alloc(Self::footprint(max, bucket_count))?;

        Ok(Self {
            slots: vec![Slot::default(); max],
            buckets: vec![None; bucket_count],
            hash_mask: (bucket_count - 1) as u32,
            count: 0,
            alloc,
        })
    }

    fn footprint(slots: usize, buckets: usize) -> usize {
        slots * std::mem::size_of::<Slot>() + buckets * std::mem::size_of::<Option<u32>>()
    }

    fn bucket(&self, id: u32) -> usize {
        (id & self.hash_mask) as usize
    }

    /// Claim a slot for `id` and return its index.
    ///
    /// # Panics
    /// Panics if the table is full; check [`SlotAllocator::is_full`] first.
    pub fn insert(&mut self, id: u32) -> usize {
        assert!(!self.is_full(), "slot table full ({} ids)", self.count);
        debug_assert!(self.lookup(id).is_none(), "id {} inserted twice", id);

        let cap = self.slots.len();
        let start = id as usize % cap;
        let Some(index) = (0..cap)
            .map(|i| (start + i) % cap)
            .find(|&i| self.slots[i].id.is_none())
        else {
            unreachable!("count below capacity but no empty slot");
        };

        let h = self.bucket(id);
        let slot = &mut self.slots[index];
        debug_assert!(slot.next.is_none());
        slot.id = Some(id);
        slot.next = self.buckets[h];
        self.buckets[h] = Some(index as u32);
        self.count += 1;
        index
    }

    /// Slot index holding `id`.
    pub fn lookup(&self, id: u32) -> Option<usize> {
        let mut cursor = self.buckets[self.bucket(id)];
        while let Some(i) = cursor {
            let slot = &self.slots[i as usize];
            if slot.id == Some(id) {
                return Some(i as usize);
            }
            cursor = slot.next;
        }
        None
    }

    /// Release the slot holding `id` and return its index.
    pub fn remove(&mut self, id: u32) -> Option<usize> {
        let h = self.bucket(id);
        let mut prev: Option<u32> = None;
        let mut cursor = self.buckets[h];

        while let Some(i) = cursor {
            let slot = self.slots[i as usize];
            if slot.id == Some(id) {
                match prev {
                    None => self.buckets[h] = slot.next,
                    Some(p) => self.slots[p as usize].next = slot.next,
                }
                self.slots[i as usize] = Slot::default();
                self.count -= 1;
                return Some(i as usize);
            }
            prev = cursor;
            cursor = slot.next;
        }
        None
    }

    /// Id occupying `slot`, if any.
    pub fn id_at(&self, slot: usize) -> Option<u32> {
        self.slots.get(slot).and_then(|s| s.id)
    }

    /// Empty every slot. Capacity is kept.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::default());
        self.buckets.fill(None);
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Number of hash buckets (power of two).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl Drop for SlotAllocator {
    fn drop(&mut self) {
        self.alloc
            .free(Self::footprint(self.slots.len(), self.buckets.len()));
    }
}
