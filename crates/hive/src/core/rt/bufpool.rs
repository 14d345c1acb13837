// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pooled chunk queue for received socket data.
//!
//! A [`BufferPool`] owns fixed-size blocks of message nodes and a freelist
//! threading through them. Each connection keeps a [`ChunkQueue`]: a singly
//! linked list of nodes, each holding one received buffer. Nodes are
//! addressed by index, so moving a node between a queue and the freelist is
//! a couple of index writes.
//!
//! Blocks are allocated on first exhaustion of the freelist and never
//! shrink. Not synchronized: one pool and its queues belong to a single
//! I/O context.

use crate::alloc::RawAlloc;
use crate::config::MESSAGE_POOL_BLOCK;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Index of a message node: `block * block_size + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pool entry. `buffer` is `Some` iff the node is linked into a queue.
#[derive(Debug, Default)]
struct MessageNode {
    buffer: Option<Vec<u8>>,
    next: Option<NodeId>,
}

/// Per-connection queue of buffered chunks.
///
/// `size` is the number of unread bytes: the sum of all queued chunk
/// lengths minus `offset` already consumed from the head chunk.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    offset: usize,
    size: usize,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered, unread bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Arena of message nodes with a freelist.
#[derive(Debug)]
pub struct BufferPool {
    blocks: Vec<Box<[MessageNode]>>,
    freelist: Option<NodeId>,
    free_nodes: usize,
    block_size: usize,
    alloc: Arc<dyn RawAlloc>,
}

impl BufferPool {
    /// Pool with the default block size (1023 nodes).
    pub fn new(alloc: Arc<dyn RawAlloc>) -> Self {
        Self::with_block_size(MESSAGE_POOL_BLOCK, alloc)
    }

    /// # Panics
    /// Panics if `block_size` is 0.
    pub fn with_block_size(block_size: usize, alloc: Arc<dyn RawAlloc>) -> Self {
        assert!(block_size > 0, "block size must be > 0");
        Self {
            blocks: Vec::new(),
            freelist: None,
            free_nodes: 0,
            block_size,
            alloc,
        }
    }

    fn block_bytes(&self) -> usize {
        self.block_size * std::mem::size_of::<MessageNode>()
    }

    fn node(&self, id: NodeId) -> &MessageNode {
        let i = id.index();
        &self.blocks[i / self.block_size][i % self.block_size]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MessageNode {
        let i = id.index();
        &mut self.blocks[i / self.block_size][i % self.block_size]
    }

    /// Allocate one more block and thread its nodes onto the freelist.
    fn grow(&mut self) -> Result<()> {
        let bytes = self.block_bytes();
        let base = self.blocks.len() * self.block_size;
        let end = base + self.block_size;
        if u32::try_from(end).is_err() {
            return Err(Error::OutOfMemory { requested: bytes });
        }
        self.alloc.alloc(bytes)?;

        let mut block: Box<[MessageNode]> =
            (0..self.block_size).map(|_| MessageNode::default()).collect();
        // Link base -> base+1 -> ... -> previous freelist head
        for (off, node) in block.iter_mut().enumerate() {
            node.next = if off + 1 < self.block_size {
                Some(NodeId((base + off + 1) as u32))
            } else {
                self.freelist
            };
        }
        self.blocks.push(block);
        self.freelist = Some(NodeId(base as u32));
        self.free_nodes += self.block_size;

        log::debug!(
            "[bufpool] grew to {} blocks ({} nodes)",
            self.blocks.len(),
            self.capacity()
        );
        Ok(())
    }

    fn take_node(&mut self) -> Result<NodeId> {
        if self.freelist.is_none() {
            self.grow()?;
        }
        let Some(id) = self.freelist else {
            unreachable!("freelist empty after grow");
        };
        self.freelist = self.node(id).next;
        self.free_nodes -= 1;
        Ok(id)
    }

    /// Unlink the head chunk of `queue`, drop its buffer and put the node
    /// back on the freelist.
    fn return_head(&mut self, queue: &mut ChunkQueue) {
        let Some(id) = queue.head else {
            return;
        };
        let freelist = self.freelist;
        let node = self.node_mut(id);
        let next = node.next;
        node.buffer = None;
        node.next = freelist;
        self.freelist = Some(id);
        self.free_nodes += 1;

        queue.head = next;
        if next.is_none() {
            debug_assert_eq!(queue.tail, Some(id));
            queue.tail = None;
        }
    }

    /// Append `data` to `queue`, taking ownership of the buffer.
    ///
    /// Empty buffers carry no bytes and are dropped without taking a node.
    /// Fails only if a new block is needed and the allocator refuses it; the
    /// queue is unchanged in that case.
    pub fn push(&mut self, queue: &mut ChunkQueue, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let id = self.take_node()?;
        let size = data.len();
        let node = self.node_mut(id);
        node.buffer = Some(data);
        node.next = None;

        match queue.tail {
            None => {
                debug_assert!(queue.head.is_none());
                queue.head = Some(id);
            }
            Some(tail) => self.node_mut(tail).next = Some(id),
        }
        queue.tail = Some(id);
        queue.size += size;
        Ok(())
    }

    /// Copy exactly `dest.len()` bytes out of `queue`.
    ///
    /// Every chunk fully consumed on the way is returned to the pool.
    ///
    /// # Panics
    /// Panics if `dest` is longer than the buffered byte count.
    pub fn read(&mut self, queue: &mut ChunkQueue, dest: &mut [u8]) {
        assert!(
            queue.size >= dest.len(),
            "read of {} bytes with only {} buffered",
            dest.len(),
            queue.size
        );
        queue.size -= dest.len();

        let mut filled = 0;
        while filled < dest.len() {
            let Some(id) = queue.head else {
                unreachable!("buffered byte count out of sync with chunk list");
            };
            let want = dest.len() - filled;
            let chunk = self.node(id).buffer.as_deref().unwrap_or_default();
            let avail = chunk.len() - queue.offset;

            if avail > want {
                dest[filled..].copy_from_slice(&chunk[queue.offset..queue.offset + want]);
                queue.offset += want;
                return;
            }
            dest[filled..filled + avail].copy_from_slice(&chunk[queue.offset..]);
            filled += avail;
            queue.offset = 0;
            self.return_head(queue);
        }
    }

    /// Drain every chunk of `queue` back to the pool.
    pub fn clear(&mut self, queue: &mut ChunkQueue) {
        while queue.head.is_some() {
            self.return_head(queue);
        }
        *queue = ChunkQueue::default();
    }

    /// Release every block.
    ///
    /// Queues must be cleared first; any chunk still queued is dropped and
    /// its queue must not be used with this pool again.
    pub fn destroy(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let live = self.live_nodes();
        if live > 0 {
            log::debug!("[bufpool] destroy with {} chunks still queued", live);
        }
        let bytes = self.block_bytes() * self.blocks.len();
        self.blocks.clear();
        self.freelist = None;
        self.free_nodes = 0;
        self.alloc.free(bytes);
    }

    /// Blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total nodes across all blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.block_size
    }

    /// Nodes sitting on the freelist.
    pub fn free_nodes(&self) -> usize {
        self.free_nodes
    }

    /// Nodes currently owned by some queue.
    pub fn live_nodes(&self) -> usize {
        self.capacity() - self.free_nodes
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{BudgetAlloc, SystemAlloc};

    fn pool(block_size: usize) -> BufferPool {
        BufferPool::with_block_size(block_size, SystemAlloc::shared())
    }

    #[test]
    fn test_push_read_across_chunks() {
        let mut p = pool(4);
        let mut q = ChunkQueue::new();
        p.push(&mut q, b"hel".to_vec()).expect("push");
        p.push(&mut q, b"lo wo".to_vec()).expect("push");
        p.push(&mut q, b"rld".to_vec()).expect("push");
        assert_eq!(q.len(), 11);

        let mut out = [0u8; 4];
        p.read(&mut q, &mut out);
        assert_eq!(&out, b"hell");
        assert_eq!(q.len(), 7);
        // First chunk fully consumed and returned
        assert_eq!(p.live_nodes(), 2);

        let mut rest = [0u8; 7];
        p.read(&mut q, &mut rest);
        assert_eq!(&rest, b"o world");
        assert!(q.is_empty());
        assert_eq!(p.live_nodes(), 0);
        assert_eq!(p.free_nodes(), 4);
    }

    #[test]
    fn test_exact_chunk_read_returns_node() {
        let mut p = pool(2);
        let mut q = ChunkQueue::new();
        p.push(&mut q, vec![1, 2, 3]).expect("push");
        let mut out = [0u8; 3];
        p.read(&mut q, &mut out);
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(p.live_nodes(), 0);
        assert!(q.head.is_none() && q.tail.is_none());
        assert_eq!(q.offset, 0);
    }

    #[test]
    fn test_zero_length_read_and_push() {
        let mut p = pool(2);
        let mut q = ChunkQueue::new();
        p.read(&mut q, &mut []);
        p.push(&mut q, Vec::new()).expect("empty push");
        assert_eq!(p.block_count(), 0);
        assert!(q.is_empty());
    }

    #[test]
    #[should_panic(expected = "buffered")]
    fn test_read_past_buffered_panics() {
        let mut p = pool(2);
        let mut q = ChunkQueue::new();
        p.push(&mut q, vec![1, 2]).expect("push");
        let mut out = [0u8; 3];
        p.read(&mut q, &mut out);
    }

    #[test]
    fn test_block_growth_bounded_by_high_water() {
        let mut p = pool(4);
        let mut q = ChunkQueue::new();
        for round in 0..50 {
            // 10 chunks in flight -> ceil(10/4) = 3 blocks
            for i in 0..10u8 {
                p.push(&mut q, vec![i; 3]).expect("push");
            }
            let mut out = vec![0u8; q.len()];
            p.read(&mut q, &mut out);
            assert_eq!(p.block_count(), 3, "round {}", round);
        }
        assert_eq!(p.live_nodes(), 0);
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut p = pool(3);
        let mut q = ChunkQueue::new();
        for _ in 0..5 {
            p.push(&mut q, vec![9; 10]).expect("push");
        }
        let mut out = [0u8; 4];
        p.read(&mut q, &mut out);
        p.clear(&mut q);
        assert!(q.is_empty());
        assert_eq!(q.offset, 0);
        assert_eq!(p.live_nodes(), 0);
        assert_eq!(p.free_nodes(), p.capacity());
    }

    #[test]
    fn test_queues_share_pool() {
        let mut p = pool(2);
        let mut a = ChunkQueue::new();
        let mut b = ChunkQueue::new();
        p.push(&mut a, b"aa".to_vec()).expect("push");
        p.push(&mut b, b"bb".to_vec()).expect("push");
        p.push(&mut a, b"AA".to_vec()).expect("push");
        let mut out = [0u8; 4];
        p.read(&mut a, &mut out);
        assert_eq!(&out, b"aaAA");
        let mut out = [0u8; 2];
        p.read(&mut b, &mut out);
        assert_eq!(&out, b"bb");
        assert_eq!(p.block_count(), 2);
    }

    #[test]
    fn test_allocator_refusal_leaves_queue_intact() {
        let node = std::mem::size_of::<MessageNode>();
        let budget = Arc::new(BudgetAlloc::with_limit(node * 2));
        let mut p = BufferPool::with_block_size(2, budget.clone());
        let mut q = ChunkQueue::new();
        p.push(&mut q, vec![1]).expect("first block fits");
        p.push(&mut q, vec![2]).expect("same block");
        let err = p.push(&mut q, vec![3]).expect_err("second block refused");
        assert!(matches!(err, Error::MemoryLimitExceeded { .. }));
        assert_eq!(q.len(), 2);

        p.destroy();
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn test_drop_releases_accounting() {
        let alloc = Arc::new(SystemAlloc::new());
        {
            let mut p = BufferPool::with_block_size(8, alloc.clone());
            let mut q = ChunkQueue::new();
            p.push(&mut q, vec![0; 16]).expect("push");
            assert!(alloc.in_use() > 0);
            p.clear(&mut q);
        }
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn test_random_fragmentation_preserves_stream() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let mut p = pool(7);
        let mut q = ChunkQueue::new();
        let mut sent = Vec::new();
        let mut received = Vec::new();

        for _ in 0..500 {
            if rng.bool() {
                let len = rng.usize(0..40);
                let chunk: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
                sent.extend_from_slice(&chunk);
                p.push(&mut q, chunk).expect("push");
            } else {
                let n = rng.usize(0..=q.len());
                let mut out = vec![0u8; n];
                p.read(&mut q, &mut out);
                received.extend_from_slice(&out);
            }
        }
        let mut tail = vec![0u8; q.len()];
        p.read(&mut q, &mut tail);
        received.extend_from_slice(&tail);
        assert_eq!(sent, received);
        assert_eq!(p.live_nodes(), 0);
    }
}
