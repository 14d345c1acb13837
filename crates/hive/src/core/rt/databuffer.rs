// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed message reassembly over a pooled chunk queue.
//!
//! Wire format: a 2- or 4-byte big-endian length header followed by that
//! many payload bytes. Socket reads arrive in arbitrary fragments; the
//! assembler buffers them and reports a message boundary once the header
//! and the full payload are available.
//!
//! Typical loop for one connection:
//!
//! ```rust
//! use hive::alloc::SystemAlloc;
//! use hive::core::rt::{BufferPool, HeaderWidth, StreamAssembler};
//!
//! let mut pool = BufferPool::new(SystemAlloc::shared());
//! let mut conn = StreamAssembler::new();
//!
//! conn.push(&mut pool, vec![0x00, 0x03, b'a']).unwrap();
//! assert_eq!(conn.try_read_header(&mut pool, HeaderWidth::Two), None);
//!
//! conn.push(&mut pool, b"bc".to_vec()).unwrap();
//! let len = conn.try_read_header(&mut pool, HeaderWidth::Two).unwrap();
//! let mut payload = vec![0u8; len];
//! conn.read(&mut pool, &mut payload);
//! conn.reset();
//! assert_eq!(payload, b"abc");
//! ```

use super::bufpool::{BufferPool, ChunkQueue};
use crate::error::{Error, Result};

/// Width of the big-endian length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderWidth {
    Two,
    Four,
}

impl HeaderWidth {
    pub fn bytes(self) -> usize {
        match self {
            HeaderWidth::Two => 2,
            HeaderWidth::Four => 4,
        }
    }

    /// Largest payload length the header can declare.
    pub fn max_len(self) -> usize {
        match self {
            HeaderWidth::Two => u16::MAX as usize,
            HeaderWidth::Four => u32::MAX as usize,
        }
    }

    /// Encode `len` as a header.
    ///
    /// Returns `None` if `len` does not fit.
    pub fn encode(self, len: usize) -> Option<Vec<u8>> {
        match self {
            HeaderWidth::Two => u16::try_from(len).ok().map(|v| v.to_be_bytes().to_vec()),
            HeaderWidth::Four => u32::try_from(len).ok().map(|v| v.to_be_bytes().to_vec()),
        }
    }

    fn decode(self, raw: &[u8; 4]) -> usize {
        match self {
            HeaderWidth::Two => u16::from_be_bytes([raw[0], raw[1]]) as usize,
            HeaderWidth::Four => u32::from_be_bytes(*raw) as usize,
        }
    }
}

impl TryFrom<usize> for HeaderWidth {
    type Error = Error;

    fn try_from(width: usize) -> Result<Self> {
        match width {
            2 => Ok(HeaderWidth::Two),
            4 => Ok(HeaderWidth::Four),
            other => Err(Error::InvalidHeaderWidth(other)),
        }
    }
}

/// Frame one payload with its length header.
///
/// Returns `None` if the payload is too long for `width`.
pub fn frame(width: HeaderWidth, payload: &[u8]) -> Option<Vec<u8>> {
    let mut out = width.encode(payload.len())?;
    out.extend_from_slice(payload);
    Some(out)
}

/// Per-connection reassembly state.
///
/// `header` caches the declared length of the message being assembled;
/// `None` means the header has not been parsed yet.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    queue: ChunkQueue,
    header: Option<usize>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one received fragment.
    pub fn push(&mut self, pool: &mut BufferPool, data: Vec<u8>) -> Result<()> {
        pool.push(&mut self.queue, data)
    }

    /// Parse the length header if needed and report whether the payload is complete.
    ///
    /// Returns `None` while either the header or the payload is still
    /// incomplete; the parsed header is cached across calls, so retrying
    /// after every push never rescans consumed bytes. Returns the payload
    /// length once all of it is buffered.
    pub fn try_read_header(&mut self, pool: &mut BufferPool, width: HeaderWidth) -> Option<usize> {
        let len = match self.header {
            Some(len) => len,
            None => {
                let n = width.bytes();
                if self.queue.len() < n {
                    return None;
                }
                let mut raw = [0u8; 4];
                pool.read(&mut self.queue, &mut raw[..n]);
                let len = width.decode(&raw);
                self.header = Some(len);
                len
            }
        };
        if self.queue.len() < len {
            return None;
        }
        Some(len)
    }

    /// Copy `dest.len()` bytes of payload out of the buffer.
    ///
    /// # Panics
    /// Panics if fewer bytes are buffered.
    pub fn read(&mut self, pool: &mut BufferPool, dest: &mut [u8]) {
        pool.read(&mut self.queue, dest);
    }

    /// Forget the cached header so the next call parses a fresh one.
    pub fn reset(&mut self) {
        self.header = None;
    }

    /// Header, payload and reset in one step.
    pub fn read_message(&mut self, pool: &mut BufferPool, width: HeaderWidth) -> Option<Vec<u8>> {
        let len = self.try_read_header(pool, width)?;
        let mut payload = vec![0u8; len];
        self.read(pool, &mut payload);
        self.reset();
        Some(payload)
    }

    /// Return all buffered chunks to the pool and drop any parsed header.
    pub fn clear(&mut self, pool: &mut BufferPool) {
        pool.clear(&mut self.queue);
        self.header = None;
    }

    /// Buffered, unread bytes (excludes an already parsed header).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Declared length of the message in progress, if its header was parsed.
    pub fn pending_header(&self) -> Option<usize> {
        self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SystemAlloc;

    fn pool() -> BufferPool {
        BufferPool::with_block_size(8, SystemAlloc::shared())
    }

    #[test]
    fn test_two_byte_header_byte_by_byte() {
        let mut p = pool();
        let mut a = StreamAssembler::new();
        let wire = [0x00, 0x05, b'h', b'e', b'l', b'l', b'o'];

        a.push(&mut p, wire[..1].to_vec()).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Two), None);
        assert_eq!(a.pending_header(), None);

        for b in &wire[1..6] {
            a.push(&mut p, vec![*b]).expect("push");
            assert_eq!(a.try_read_header(&mut p, HeaderWidth::Two), None);
        }
        assert_eq!(a.pending_header(), Some(5));

        a.push(&mut p, wire[6..].to_vec()).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Two), Some(5));
        let mut out = [0u8; 5];
        a.read(&mut p, &mut out);
        a.reset();
        assert_eq!(&out, b"hello");
        assert!(a.is_empty());
        assert_eq!(a.pending_header(), None);
        assert_eq!(p.live_nodes(), 0);
    }

    #[test]
    fn test_four_byte_header() {
        let mut p = pool();
        let mut a = StreamAssembler::new();
        let mut wire = 300u32.to_be_bytes().to_vec();
        wire.extend(std::iter::repeat(7u8).take(300));
        a.push(&mut p, wire).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Four), Some(300));
        let msg = a.read_message(&mut p, HeaderWidth::Four).expect("complete");
        assert_eq!(msg.len(), 300);
        assert!(msg.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_header_split_across_chunks() {
        let mut p = pool();
        let mut a = StreamAssembler::new();
        a.push(&mut p, vec![0x00, 0x00, 0x01]).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Four), None);
        assert_eq!(a.len(), 3);
        a.push(&mut p, vec![0x02, 0xAA]).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Four), None);
        assert_eq!(a.pending_header(), Some(0x0102));
    }

    #[test]
    fn test_back_to_back_messages_in_one_chunk() {
        let mut p = pool();
        let mut a = StreamAssembler::new();
        let mut wire = frame(HeaderWidth::Two, b"one").expect("fits");
        wire.extend(frame(HeaderWidth::Two, b"").expect("fits"));
        wire.extend(frame(HeaderWidth::Two, b"three").expect("fits"));
        wire.extend_from_slice(&[0x00]); // half of the next header
        a.push(&mut p, wire).expect("push");

        assert_eq!(a.read_message(&mut p, HeaderWidth::Two).as_deref(), Some(&b"one"[..]));
        assert_eq!(a.read_message(&mut p, HeaderWidth::Two).as_deref(), Some(&b""[..]));
        assert_eq!(a.read_message(&mut p, HeaderWidth::Two).as_deref(), Some(&b"three"[..]));
        assert_eq!(a.read_message(&mut p, HeaderWidth::Two), None);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_clear_drops_partial_state() {
        let mut p = pool();
        let mut a = StreamAssembler::new();
        a.push(&mut p, vec![0x00, 0x10, 1, 2, 3]).expect("push");
        assert_eq!(a.try_read_header(&mut p, HeaderWidth::Two), None);
        a.clear(&mut p);
        assert!(a.is_empty());
        assert_eq!(a.pending_header(), None);
        assert_eq!(p.live_nodes(), 0);
    }

    #[test]
    fn test_header_width_conversions() {
        assert_eq!(HeaderWidth::try_from(2).expect("valid"), HeaderWidth::Two);
        assert_eq!(HeaderWidth::try_from(4).expect("valid"), HeaderWidth::Four);
        assert!(matches!(
            HeaderWidth::try_from(3),
            Err(Error::InvalidHeaderWidth(3))
        ));
        assert_eq!(HeaderWidth::Two.encode(0x1234), Some(vec![0x12, 0x34]));
        assert_eq!(HeaderWidth::Two.encode(70_000), None);
        assert_eq!(
            HeaderWidth::Four.encode(0x0102_0304),
            Some(vec![1, 2, 3, 4])
        );
    }

    #[test]
    fn test_random_fragmentation_yields_all_frames() {
        let mut rng = fastrand::Rng::with_seed(42);
        let mut p = pool();
        let mut a = StreamAssembler::new();

        let frames: Vec<Vec<u8>> = (0..100)
            .map(|_| (0..rng.usize(0..200)).map(|_| rng.u8(..)).collect())
            .collect();
        let wire: Vec<u8> = frames
            .iter()
            .flat_map(|f| frame(HeaderWidth::Two, f).expect("fits"))
            .collect();

        let mut got = Vec::new();
        let mut pos = 0;
        while pos < wire.len() {
            let n = rng.usize(1..=32).min(wire.len() - pos);
            a.push(&mut p, wire[pos..pos + n].to_vec()).expect("push");
            pos += n;
            while let Some(msg) = a.read_message(&mut p, HeaderWidth::Two) {
                got.push(msg);
            }
        }
        assert_eq!(got, frames);
        assert!(a.is_empty());
    }
}
