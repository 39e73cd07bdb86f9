//! File cache configuration.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CACHE_ALIVE_SEC: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Root directory; each remote file gets its own subdirectory.
    pub cache_root: PathBuf,

    /// Idle seconds after which a cached copy is removed.
    pub alive_time_sec: u64,

    /// Total disk bytes the manager keeps cached copies under, if bounded.
    pub max_disk_bytes: Option<u64>,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            cache_root: env::temp_dir().join("vsort-cache"),
            alive_time_sec: DEFAULT_CACHE_ALIVE_SEC,
            max_disk_bytes: None,
        }
    }
}

impl FileCacheConfig {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Default::default()
        }
    }

    /// Environment variables:
    /// - `VSORT_CACHE_DIR`: cache root directory
    /// - `VSORT_CACHE_ALIVE_SEC`: idle timeout in seconds
    /// - `VSORT_CACHE_MAX_BYTES`: disk bound for all cached copies
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = env::var("VSORT_CACHE_DIR") {
            if !dir.is_empty() {
                cfg.cache_root = PathBuf::from(dir);
            }
        }
        if let Some(v) = env::var("VSORT_CACHE_ALIVE_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            cfg.alive_time_sec = v;
        }
        cfg.max_disk_bytes = env::var("VSORT_CACHE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok());
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(Error::Config("cache_root must not be empty".into()));
        }
        if self.max_disk_bytes == Some(0) {
            return Err(Error::Config("max_disk_bytes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = FileCacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.alive_time_sec, DEFAULT_CACHE_ALIVE_SEC);
    }

    #[test]
    fn zero_disk_bound_is_rejected() {
        let cfg = FileCacheConfig {
            max_disk_bytes: Some(0),
            ..FileCacheConfig::new("/tmp/x")
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = FileCacheConfig::new("/var/cache/vsort");
        let s = serde_json::to_string(&cfg).unwrap();
        let back: FileCacheConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }
}
