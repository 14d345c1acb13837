// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives for connection buffering and id management.

pub mod bufpool;
pub mod databuffer;
pub mod hashid;

pub use bufpool::{BufferPool, ChunkQueue};
pub use databuffer::{frame, HeaderWidth, StreamAssembler};
pub use hashid::SlotAllocator;
