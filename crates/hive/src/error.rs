// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every runtime primitive.
//!
//! Only recoverable or reportable conditions live here. Contract violations
//! (reading past the buffered byte count, inserting into a full slot table)
//! are programmer errors and panic at the call site instead.

use crate::mailbox::Handle;

/// Errors returned by hive runtime operations.
///
/// # Example
///
/// ```rust
/// use hive::alloc::{BudgetAlloc, RawAlloc};
/// use hive::Error;
///
/// let budget = BudgetAlloc::with_limit(64);
/// match budget.alloc(128) {
///     Err(Error::MemoryLimitExceeded { limit, .. }) => assert_eq!(limit, 64),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The raw allocator could not provide `requested` bytes.
    OutOfMemory { requested: usize },
    /// A budgeted allocator refused to grow past its hard limit.
    MemoryLimitExceeded {
        limit: usize,
        in_use: usize,
        requested: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Capacity must be non-zero.
    InvalidCapacity(usize),
    /// Length headers are 2 or 4 bytes wide.
    InvalidHeaderWidth(usize),
    /// Configuration value is out of range or malformed.
    InvalidConfig(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Target handle does not resolve to a live actor.
    ActorNotFound(Handle),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Every connection slot is taken.
    ConnectionLimit(usize),
    /// Descriptor is already registered.
    DuplicateConnection(u32),
    /// Descriptor was never opened or is already closed.
    UnknownConnection(u32),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Resource
            Error::OutOfMemory { requested } => {
                write!(f, "Out of memory: allocation of {} bytes refused", requested)
            }
            Error::MemoryLimitExceeded {
                limit,
                in_use,
                requested,
            } => write!(
                f,
                "Memory limit exceeded: {} + {} bytes > limit {}",
                in_use, requested, limit
            ),
            // Config
            Error::InvalidCapacity(cap) => write!(f, "Invalid capacity: {} (must be > 0)", cap),
            Error::InvalidHeaderWidth(width) => {
                write!(f, "Invalid header width: {} (must be 2 or 4)", width)
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            // Delivery
            Error::ActorNotFound(handle) => write!(f, "Actor not found: :{:08x}", handle),
            // Connection
            Error::ConnectionLimit(max) => {
                write!(f, "Connection limit reached: all {} slots in use", max)
            }
            Error::DuplicateConnection(fd) => write!(f, "Connection {} already open", fd),
            Error::UnknownConnection(fd) => write!(f, "Unknown connection {}", fd),
            // Other
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Result alias for hive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::InvalidHeaderWidth(3).to_string(),
            "Invalid header width: 3 (must be 2 or 4)"
        );
        assert_eq!(
            Error::ActorNotFound(0x10).to_string(),
            "Actor not found: :00000010"
        );
        assert_eq!(
            Error::MemoryLimitExceeded {
                limit: 100,
                in_use: 90,
                requested: 20
            }
            .to_string(),
            "Memory limit exceeded: 90 + 20 bytes > limit 100"
        );
    }

    #[test]
    fn test_io_error_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.source().is_some());
        assert!(Error::ConnectionLimit(4).source().is_none());
    }
}
