//! Cache that mirrors an entire remote file on local disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

use super::reader::LocalFileReader;
use super::{done_file_path, download_cache_to_local, FileCache, FileReader, FileReaderRef};

pub(crate) const WHOLE_FILE_CACHE_NAME: &str = "whole_file_cache";

#[derive(Debug, Default)]
struct CacheState {
    last_access: Option<Instant>,
    local: Option<LocalFileReader>,
}

/// The first read downloads the whole remote file; later reads are served
/// from the local copy until it is cleaned.
pub struct WholeFileCache {
    cache_dir: PathBuf,
    alive_time: Duration,
    remote: FileReaderRef,
    state: Mutex<CacheState>,
}

impl WholeFileCache {
    pub fn new(cache_dir: impl Into<PathBuf>, alive_time: Duration, remote: FileReaderRef) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            alive_time,
            remote,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(WHOLE_FILE_CACHE_NAME)
    }

    /// The local copy exists and carries its done marker.
    pub fn is_cached(&self) -> bool {
        done_file_path(&self.cache_file()).exists()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| Error::Cache(format!("lock poisoned for {}", self.cache_dir.display())))
    }

    /// Make sure a complete local copy exists, downloading it if needed.
    fn ensure_local(&self, state: &mut CacheState) -> Result<()> {
        let cache_file = self.cache_file();
        let done_file = done_file_path(&cache_file);
        if state.local.is_some() && done_file.exists() {
            return Ok(());
        }
        if !done_file.exists() {
            let size = usize::try_from(self.remote.size())
                .map_err(|_| Error::Cache("remote file too large to cache".into()))?;
            download_cache_to_local(&cache_file, &done_file, self.remote.as_ref(), size, 0)?;
        }
        state.local = Some(LocalFileReader::open(&cache_file)?);
        Ok(())
    }

    fn remove_local(&self, state: &mut CacheState) -> Result<()> {
        let cache_file = self.cache_file();
        let done_file = done_file_path(&cache_file);
        // Marker goes first so a half-removed copy is never trusted.
        for p in [&done_file, &cache_file] {
            if p.exists() {
                fs::remove_file(p)?;
            }
        }
        state.local = None;
        debug!(cache_file = %cache_file.display(), "removed cached copy");
        Ok(())
    }
}

impl FileReader for WholeFileCache {
    fn path(&self) -> &Path {
        self.remote.path()
    }

    fn size(&self) -> u64 {
        self.remote.size()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock()?;
        self.ensure_local(&mut state)?;
        state.last_access = Some(Instant::now());
        match &state.local {
            Some(local) => local.read_at(offset, buf),
            None => Err(Error::Cache("local copy missing after download".into())),
        }
    }
}

impl FileCache for WholeFileCache {
    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_file_size(&self) -> u64 {
        if !self.is_cached() {
            return 0;
        }
        fs::metadata(self.cache_file()).map(|m| m.len()).unwrap_or(0)
    }

    fn remote_file_reader(&self) -> FileReaderRef {
        self.remote.clone()
    }

    fn last_access(&self) -> Option<Instant> {
        self.lock().ok().and_then(|s| s.last_access)
    }

    fn clean_timeout_cache(&self) -> Result<()> {
        let mut state = self.lock()?;
        let idle = state
            .last_access
            .map_or(true, |t| t.elapsed() >= self.alive_time);
        if idle {
            self.remove_local(&mut state)?;
        }
        Ok(())
    }

    fn clean_all_cache(&self) -> Result<()> {
        let mut state = self.lock()?;
        self.remove_local(&mut state)
    }
}
