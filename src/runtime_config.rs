//! # Runtime Configuration Module
//!
//! Coroutine runtime tuning loaded from environment variables.
//!
//! ## Environment Variables
//!
//! ### `JOLT_STACK_SIZE`
//!
//! Stack size for request coroutines. Accepts decimal (`262144`) or
//! hexadecimal (`0x40000`). Default: `0x40000` (256 KB).
//!
//! Request coroutines run the whole compiling pipeline: minijinja rendering
//! (which recurses through includes and nested blocks) and the gzip encoder,
//! whose deflate state alone does not fit in 32 KB. Values below the default
//! are accepted but logged as a warning, since an overflow kills the
//! connection without a response. Total virtual memory is roughly
//! `stack_size × concurrent requests`.
//!
//! ### `JOLT_WORKERS`
//!
//! Number of may worker threads. Unset keeps may's default (one per core).
//!
//! ## Usage
//!
//! ```rust
//! use jolt::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! config.apply();
//! ```

use std::env;
use tracing::{info, warn};

/// Smallest stack known to hold a gzip-finalized template render.
pub const DEFAULT_STACK_SIZE: usize = 0x40000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Worker thread count, `None` for may's default
    pub workers: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = env::var("JOLT_STACK_SIZE")
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        let workers = env::var("JOLT_WORKERS")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);
        RuntimeConfig {
            stack_size,
            workers,
        }
    }

    /// Push the settings into the global may configuration.
    ///
    /// Must run before the first coroutine is spawned.
    pub fn apply(&self) {
        if self.stack_size < DEFAULT_STACK_SIZE {
            warn!(
                stack_size = self.stack_size,
                recommended = DEFAULT_STACK_SIZE,
                "coroutine stack is smaller than a compressed render needs"
            );
        }
        let config = may::config();
        config.set_stack_size(self.stack_size);
        if let Some(workers) = self.workers {
            config.set_workers(workers);
        }
        info!(
            stack_size = self.stack_size,
            workers = ?self.workers,
            "coroutine runtime configured"
        );
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}
