//! Sort operator configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rows accumulated before a block is flushed to the partial sorter.
pub const DEFAULT_BUFFERED_BLOCK_ROWS: usize = 1024 * 1024;
/// Bytes accumulated before a block is flushed to the partial sorter.
pub const DEFAULT_BUFFERED_BLOCK_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Row-count ceiling of the block accumulator.
    pub buffered_block_rows: usize,

    /// Byte-size ceiling of the block accumulator.
    pub buffered_block_bytes: usize,

    /// Maximum rows per output batch.
    pub batch_size: usize,

    /// Hard memory cap (in bytes) for retained blocks.
    pub mem_cap_bytes: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            buffered_block_rows: DEFAULT_BUFFERED_BLOCK_ROWS,
            buffered_block_bytes: DEFAULT_BUFFERED_BLOCK_BYTES,
            batch_size: DEFAULT_BATCH_SIZE,
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
        }
    }
}

impl SortConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `VSORT_BUFFERED_BLOCK_ROWS`: accumulator row ceiling
    /// - `VSORT_BUFFERED_BLOCK_BYTES`: accumulator byte ceiling
    /// - `VSORT_BATCH_SIZE`: rows per output batch
    /// - `VSORT_MEM_CAP_BYTES`: memory cap in bytes
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("VSORT_BUFFERED_BLOCK_ROWS") {
            cfg.buffered_block_rows = v;
        }
        if let Some(v) = env_usize("VSORT_BUFFERED_BLOCK_BYTES") {
            cfg.buffered_block_bytes = v;
        }
        if let Some(v) = env_usize("VSORT_BATCH_SIZE") {
            cfg.batch_size = v;
        }
        if let Some(v) = env_usize("VSORT_MEM_CAP_BYTES") {
            cfg.mem_cap_bytes = v;
        }

        cfg
    }

    /// Every threshold must be positive.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("buffered_block_rows", self.buffered_block_rows),
            ("buffered_block_bytes", self.buffered_block_bytes),
            ("batch_size", self.batch_size),
            ("mem_cap_bytes", self.mem_cap_bytes),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.parse::<usize>().ok())
}
