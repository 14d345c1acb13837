// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (wheel geometry, pool sizing)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] built from defaults, `HIVE_*`
//!   environment variables, builder setters, or a YAML document
//!
//! # Example YAML
//!
//! ```yaml
//! max_connections: 4096
//! header_width: 4
//! timer_interval_us: 2500
//! memory_limit: 67108864
//! ```

use crate::alloc::{BudgetAlloc, RawAlloc};
use crate::core::rt::HeaderWidth;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

// =======================================================================
// Timing wheel geometry
// =======================================================================

/// Bits of the tick counter resolved by the near ring.
pub const TIME_NEAR_SHIFT: u32 = 8;
/// Slots in the near ring (256).
pub const TIME_NEAR: usize = 1 << TIME_NEAR_SHIFT;
/// Bits of the tick counter resolved by each level ring.
pub const TIME_LEVEL_SHIFT: u32 = 6;
/// Slots in each level ring (64).
pub const TIME_LEVEL: usize = 1 << TIME_LEVEL_SHIFT;
/// Number of cascading level rings above the near ring.
pub const TIME_LEVELS: usize = 4;
pub const TIME_NEAR_MASK: u32 = (TIME_NEAR as u32) - 1;
pub const TIME_LEVEL_MASK: u32 = (TIME_LEVEL as u32) - 1;

// 8 + 4 * 6 bits must cover the full 32-bit tick counter
const _: () = assert!(TIME_NEAR_SHIFT + TIME_LEVEL_SHIFT * TIME_LEVELS as u32 == 32);

/// Centiseconds per second. One tick is one centisecond.
pub const TICKS_PER_SECOND: u64 = 100;

// =======================================================================
// Pools and tables
// =======================================================================

/// Message nodes allocated per pool block.
pub const MESSAGE_POOL_BLOCK: usize = 1023;

/// Smallest hash bucket array a slot allocator builds.
pub const MIN_HASH_BUCKETS: usize = 16;

/// First memory warning threshold for budgeted allocators (32 MiB).
pub const MEMORY_WARNING_REPORT: usize = 32 * 1024 * 1024;

// =======================================================================
// Defaults
// =======================================================================

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;
pub const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_micros(2500);

/// Dynamic configuration for a hive runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Slot capacity of the gate's connection table.
    pub max_connections: usize,
    /// Length prefix width for framed connections.
    pub header_width: HeaderWidth,
    /// Message nodes per buffer pool block.
    pub pool_block_size: usize,
    /// Sleep between timer thread updates.
    pub timer_interval: Duration,
    /// Hard memory limit in bytes (0 = unlimited).
    pub memory_limit: usize,
    /// First memory warning threshold in bytes.
    pub memory_warning: usize,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            header_width: HeaderWidth::Two,
            pool_block_size: MESSAGE_POOL_BLOCK,
            timer_interval: DEFAULT_TIMER_INTERVAL,
            memory_limit: 0,
            memory_warning: MEMORY_WARNING_REPORT,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HIVE_*` environment variables.
    ///
    /// Unparseable values are ignored; an out-of-range header width is
    /// reported so a typo does not silently switch framing.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = env_parse("HIVE_MAX_CONNECTIONS") {
            cfg.max_connections = v;
        }
        if let Some(v) = env_parse::<usize>("HIVE_HEADER_WIDTH") {
            cfg.header_width = HeaderWidth::try_from(v)?;
        }
        if let Some(v) = env_parse("HIVE_POOL_BLOCK_SIZE") {
            cfg.pool_block_size = v;
        }
        if let Some(v) = env_parse("HIVE_TIMER_INTERVAL_US") {
            cfg.timer_interval = Duration::from_micros(v);
        }
        if let Some(v) = env_parse("HIVE_MEMORY_LIMIT") {
            cfg.memory_limit = v;
        }
        if let Some(v) = env_parse("HIVE_MEMORY_WARNING") {
            cfg.memory_warning = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    pub fn header_width(mut self, width: HeaderWidth) -> Self {
        self.header_width = width;
        self
    }

    pub fn pool_block_size(mut self, n: usize) -> Self {
        self.pool_block_size = n;
        self
    }

    pub fn timer_interval(mut self, interval: Duration) -> Self {
        self.timer_interval = interval;
        self
    }

    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn memory_warning(mut self, bytes: usize) -> Self {
        self.memory_warning = bytes;
        self
    }

    /// Budget allocator enforcing `memory_limit` and reporting from `memory_warning`.
    pub fn allocator(&self) -> Arc<dyn RawAlloc> {
        let budget = BudgetAlloc::new(self.memory_limit, self.memory_warning);
        if self.memory_limit != 0 {
            log::info!(
                "[config] Memory limit {:.2} M",
                self.memory_limit as f64 / (1024.0 * 1024.0)
            );
        }
        Arc::new(budget)
    }

    /// Check ranges that would otherwise fail later inside a primitive.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig("max_connections must be > 0".into()));
        }
        if self.max_connections > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_connections {} exceeds u32 range",
                self.max_connections
            )));
        }
        if self.pool_block_size == 0 {
            return Err(Error::InvalidConfig("pool_block_size must be > 0".into()));
        }
        if self.timer_interval.is_zero() {
            return Err(Error::InvalidConfig("timer_interval must be > 0".into()));
        }
        if self.memory_warning == 0 {
            return Err(Error::InvalidConfig("memory_warning must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(feature = "yaml-config")]
mod yaml {
    use super::RuntimeConfig;
    use crate::core::rt::HeaderWidth;
    use crate::error::{Error, Result};
    use serde::Deserialize;
    use std::path::Path;
    use std::time::Duration;

    /// YAML document shape. Every field is optional and falls back to the default.
    #[derive(Debug, Deserialize, Default)]
    #[serde(default, deny_unknown_fields)]
    struct YamlRuntimeConfig {
        max_connections: Option<usize>,
        header_width: Option<usize>,
        pool_block_size: Option<usize>,
        timer_interval_us: Option<u64>,
        memory_limit: Option<usize>,
        memory_warning: Option<usize>,
    }

    impl RuntimeConfig {
        /// Parse a YAML document on top of the defaults.
        pub fn from_yaml_str(text: &str) -> Result<Self> {
            let doc: YamlRuntimeConfig = serde_yaml::from_str(text)
                .map_err(|e| Error::InvalidConfig(format!("YAML parse error: {}", e)))?;

            let mut cfg = RuntimeConfig::default();
            if let Some(v) = doc.max_connections {
                cfg.max_connections = v;
            }
            if let Some(v) = doc.header_width {
                cfg.header_width = HeaderWidth::try_from(v)?;
            }
            if let Some(v) = doc.pool_block_size {
                cfg.pool_block_size = v;
            }
            if let Some(v) = doc.timer_interval_us {
                cfg.timer_interval = Duration::from_micros(v);
            }
            if let Some(v) = doc.memory_limit {
                cfg.memory_limit = v;
            }
            if let Some(v) = doc.memory_warning {
                cfg.memory_warning = v;
            }
            cfg.validate()?;
            Ok(cfg)
        }

        /// Load a YAML file.
        pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(Error::ConfigFileNotFound(path.display().to_string()));
            }
            let text = std::fs::read_to_string(path)?;
            Self::from_yaml_str(&text)
        }
    }
}
