// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Hive - actor runtime primitives
//!
//! The low-level building blocks an actor runtime is assembled from:
//! pooled socket buffers, length-prefixed stream framing, a descriptor to
//! slot map and a hierarchical timing wheel.
//!
//! ## Quick Start
//!
//! ```rust
//! use hive::alloc::SystemAlloc;
//! use hive::{BufferPool, HeaderWidth, StreamAssembler};
//!
//! let mut pool = BufferPool::new(SystemAlloc::shared());
//! let mut conn = StreamAssembler::new();
//!
//! conn.push(&mut pool, vec![0x00, 0x05, b'h', b'e']).unwrap();
//! assert!(conn.read_message(&mut pool, HeaderWidth::Two).is_none());
//!
//! conn.push(&mut pool, b"llo".to_vec()).unwrap();
//! let msg = conn.read_message(&mut pool, HeaderWidth::Two).unwrap();
//! assert_eq!(msg, b"hello");
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BufferPool`] | Block-allocated pool of chunk nodes shared by many streams |
//! | [`StreamAssembler`] | Per-connection reassembly of length-prefixed frames |
//! | [`SlotAllocator`] | Fixed-capacity map from descriptor ids to dense slots |
//! | [`TimingWheel`] | Five-level wheel delivering timeouts as mailbox responses |
//! | [`Timer`] | Wheel plus the centisecond clock that drives it |
//! | [`Gate`] | Connection table combining the three stream primitives |
//!
//! ## Modules Overview
//!
//! - [`crate::core::rt`] - Buffer pool, stream assembler, slot allocator
//! - [`timer`] - Timing wheel, clock, driver thread
//! - [`mailbox`] - Messages, handles and the dispatcher seam
//! - [`alloc`] - Memory accounting
//! - [`config`] - Constants and runtime configuration

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Memory accounting behind every pool and timer node.
pub mod alloc;
/// Global constants and runtime configuration.
pub mod config;
/// Runtime data structures (buffers, framing, slot map).
pub mod core;
/// Error type shared by the whole crate.
pub mod error;
/// Connection table for framed sockets.
pub mod gate;
/// Message envelope and actor delivery.
pub mod mailbox;
/// Timing wheel and clock.
pub mod timer;

pub use crate::core::rt::{frame, BufferPool, HeaderWidth, SlotAllocator, StreamAssembler};
pub use alloc::{BudgetAlloc, RawAlloc, SystemAlloc};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use gate::Gate;
pub use mailbox::{ActorRegistry, Dispatcher, Handle, Message, MessageType, Session};
pub use timer::{spawn_timer_thread, Clock, Timer, TimerThread, TimingWheel};
