//! Ingestion and dispatch settings.
//!
//! Both structs read their values from environment variables and fall back
//! to defaults for anything unset or unparsable.

use std::env;

use storage::MAX_CHUNK_SIZE;

use crate::dispatch::DispatchPolicy;

/// Default rows per insert statement.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of launches in flight per dispatched batch.
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 16;

/// Settings for a single file run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Rows per insert statement
    pub chunk_size: usize,
    /// Reject source objects larger than this many bytes
    pub max_file_bytes: Option<usize>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_bytes: None,
        }
    }
}

impl IngestionConfig {
    /// Load configuration from `LOAD_CHUNK_SIZE` and `MAX_FILE_BYTES`.
    pub fn from_env() -> Self {
        Self {
            chunk_size: parse_var("LOAD_CHUNK_SIZE").unwrap_or(DEFAULT_CHUNK_SIZE),
            max_file_bytes: parse_var("MAX_FILE_BYTES").filter(|&n: &usize| n > 0),
        }
    }

    /// Chunk size limited to what a single insert statement can bind.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }
}

/// Settings for the event dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub policy: DispatchPolicy,
    /// Launches in flight at once
    pub concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from `DISPATCH_CONCURRENCY`.
    pub fn from_env() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            concurrency: parse_var("DISPATCH_CONCURRENCY")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_DISPATCH_CONCURRENCY),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
