//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime that hosts the dev
//! server.
//!
//! ## Environment Variables
//!
//! ### `BRRTS_STACK_SIZE`
//!
//! Stack size for request coroutines. Accepts decimal (`65536`) or
//! hexadecimal (`0x10000`) values. Default: `0x10000` (64 KB).
//!
//! Theme builds and brotli compression run on the request coroutine, so the
//! default is larger than a plain router needs.
//!
//! ### `BRRTS_WORKERS`
//!
//! Number of worker threads the `may` scheduler spreads coroutines over.
//! Default: available parallelism.
//!
//! ## Usage
//!
//! ```rust
//! use brrtserve::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! config.apply();
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
    /// Scheduler worker threads
    pub workers: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = env::var("BRRTS_STACK_SIZE")
            .ok()
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        let workers = env::var("BRRTS_WORKERS")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(default_workers);
        RuntimeConfig {
            stack_size,
            workers,
        }
    }

    /// Push the settings into the global `may` configuration.
    ///
    /// Must run before the first coroutine is spawned.
    pub fn apply(&self) {
        may::config()
            .set_stack_size(self.stack_size)
            .set_workers(self.workers);
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
