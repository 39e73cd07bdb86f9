//! Registry of live file caches with timeout and disk-size eviction.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::config::FileCacheConfig;
use super::whole_file::{WholeFileCache, WHOLE_FILE_CACHE_NAME};
use super::{cache_key, done_file_path, is_cache_key, FileCache, FileReaderRef};

pub struct FileCacheManager {
    config: FileCacheConfig,
    caches: Mutex<Vec<Arc<dyn FileCache>>>,
}

impl FileCacheManager {
    pub fn new(config: FileCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            caches: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Arc<dyn FileCache>>>> {
        self.caches
            .lock()
            .map_err(|_| Error::Cache("cache registry lock poisoned".into()))
    }

    /// Create and register a whole-file cache for `remote` under the cache
    /// root. The same remote path always maps to the same directory.
    pub fn new_whole_file_cache(&self, remote: FileReaderRef) -> Result<Arc<WholeFileCache>> {
        let dir = self.config.cache_root.join(cache_key(remote.path()));
        let cache = Arc::new(WholeFileCache::new(
            dir,
            Duration::from_secs(self.config.alive_time_sec),
            remote,
        ));
        self.register(cache.clone())?;
        Ok(cache)
    }

    pub fn register(&self, cache: Arc<dyn FileCache>) -> Result<()> {
        self.lock()?.push(cache);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently cached across all registered caches.
    pub fn cached_bytes(&self) -> Result<u64> {
        Ok(self.lock()?.iter().map(|c| c.cache_file_size()).sum())
    }

    /// Run `clean_timeout_cache` on every cache. Returns the bytes freed.
    pub fn clean_timeout_caches(&self) -> Result<u64> {
        let mut caches = self.lock()?;
        let mut freed = 0;
        for cache in caches.iter() {
            let before = cache.cache_file_size();
            cache.clean_timeout_cache()?;
            freed += before.saturating_sub(cache.cache_file_size());
        }
        prune_unused(&mut caches);
        if freed > 0 {
            info!(freed_bytes = freed, "cleaned idle file caches");
        }
        Ok(freed)
    }

    /// Evict least recently used copies until the total fits `max_bytes`.
    /// Returns the bytes freed.
    pub fn gc_by_disk_size(&self, max_bytes: u64) -> Result<u64> {
        let mut caches = self.lock()?;
        let mut live: Vec<(Arc<dyn FileCache>, u64)> = caches
            .iter()
            .map(|c| (c.clone(), c.cache_file_size()))
            .filter(|(_, size)| *size > 0)
            .collect();
        let mut total: u64 = live.iter().map(|(_, size)| size).sum();
        if total <= max_bytes {
            drop(live);
            prune_unused(&mut caches);
            return Ok(0);
        }

        // Never-read copies sort first.
        live.sort_by_key(|(c, _)| c.last_access());
        let mut freed = 0;
        for (cache, size) in live {
            if total <= max_bytes {
                break;
            }
            cache.clean_all_cache()?;
            total -= size;
            freed += size;
            debug!(cache_dir = %cache.cache_dir().display(), bytes = size, "evicted file cache");
        }
        prune_unused(&mut caches);
        info!(freed_bytes = freed, remaining_bytes = total, "file cache gc by disk size");
        Ok(freed)
    }

    /// Apply the configured disk bound, if any.
    pub fn gc(&self) -> Result<u64> {
        match self.config.max_disk_bytes {
            Some(max) => self.gc_by_disk_size(max),
            None => Ok(0),
        }
    }

    /// Remove leftovers of interrupted downloads under the cache root: a
    /// cache file with no done marker, or a marker with no cache file.
    /// Returns the number of files removed.
    ///
    /// Only entries this manager creates are considered, so a cache root
    /// shared with other files is safe to sweep. Must not run while
    /// downloads are in flight.
    pub fn remove_orphan_files(&self) -> Result<usize> {
        let root = &self.config.cache_root;
        if !root.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(root)? {
            let dir = entry?.path();
            let owned = dir.is_dir()
                && dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_cache_key);
            if owned {
                removed += remove_orphans(&dir)?;
            }
        }
        if removed > 0 {
            info!(dir = %root.display(), removed, "removed orphan cache files");
        }
        Ok(removed)
    }
}

/// Drop registry entries nobody else holds once they have nothing on disk.
fn prune_unused(caches: &mut Vec<Arc<dyn FileCache>>) {
    caches.retain(|c| Arc::strong_count(c) > 1 || c.cache_file_size() > 0);
}

fn remove_orphans(dir: &Path) -> Result<usize> {
    let cache_file = dir.join(WHOLE_FILE_CACHE_NAME);
    let done_file = done_file_path(&cache_file);
    let orphan = match (cache_file.exists(), done_file.exists()) {
        (true, false) => &cache_file,
        (false, true) => &done_file,
        _ => return Ok(0),
    };
    fs::remove_file(orphan)?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileReader, MemoryFileReader};

    fn manager(dir: &Path) -> FileCacheManager {
        FileCacheManager::new(FileCacheConfig::new(dir)).unwrap()
    }

    fn warm(cache: &WholeFileCache) {
        let mut buf = [0u8; 1];
        cache.read_at(0, &mut buf).unwrap();
    }

    #[test]
    fn same_remote_maps_to_same_dir() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let a = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/a", vec![1; 10])))
            .unwrap();
        let b = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/a", vec![1; 10])))
            .unwrap();
        assert_eq!(a.cache_dir(), b.cache_dir());
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn gc_evicts_least_recently_used_first() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let old = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/old", vec![0; 100])))
            .unwrap();
        let new = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/new", vec![0; 100])))
            .unwrap();
        warm(&old);
        std::thread::sleep(Duration::from_millis(5));
        warm(&new);
        assert_eq!(m.cached_bytes().unwrap(), 200);

        assert_eq!(m.gc_by_disk_size(150).unwrap(), 100);
        assert!(!old.is_cached());
        assert!(new.is_cached());
        assert_eq!(m.gc_by_disk_size(150).unwrap(), 0);
    }

    #[test]
    fn timeout_clean_reports_freed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileCacheConfig {
            alive_time_sec: 0,
            ..FileCacheConfig::new(dir.path())
        };
        let m = FileCacheManager::new(cfg).unwrap();
        let c = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/x", vec![7; 42])))
            .unwrap();
        warm(&c);
        assert_eq!(m.clean_timeout_caches().unwrap(), 42);
        assert_eq!(m.cached_bytes().unwrap(), 0);
    }

    #[test]
    fn orphans_are_removed_and_complete_copies_kept() {
        let dir = tempfile::tempdir().unwrap();
        let complete = dir.path().join(cache_key(Path::new("r/complete")));
        let partial = dir.path().join(cache_key(Path::new("r/partial")));
        let stray = dir.path().join(cache_key(Path::new("r/stray")));
        for d in [&complete, &partial, &stray] {
            fs::create_dir_all(d).unwrap();
        }
        fs::write(complete.join(WHOLE_FILE_CACHE_NAME), b"data").unwrap();
        fs::write(done_file_path(&complete.join(WHOLE_FILE_CACHE_NAME)), b"").unwrap();
        fs::write(partial.join(WHOLE_FILE_CACHE_NAME), b"da").unwrap();
        fs::write(done_file_path(&stray.join(WHOLE_FILE_CACHE_NAME)), b"").unwrap();

        let m = manager(dir.path());
        assert_eq!(m.remove_orphan_files().unwrap(), 2);
        assert!(complete.join(WHOLE_FILE_CACHE_NAME).exists());
        assert!(!partial.join(WHOLE_FILE_CACHE_NAME).exists());
        assert!(!done_file_path(&stray.join(WHOLE_FILE_CACHE_NAME)).exists());
    }

    #[test]
    fn orphan_sweep_leaves_foreign_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("input.csv"), b"k\n1\n").unwrap();
        let other = dir.path().join("reports");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join(WHOLE_FILE_CACHE_NAME), b"not ours").unwrap();

        let m = manager(dir.path());
        assert_eq!(m.remove_orphan_files().unwrap(), 0);
        assert!(dir.path().join("input.csv").exists());
        assert!(other.join(WHOLE_FILE_CACHE_NAME).exists());
    }

    #[test]
    fn registry_drops_released_empty_caches() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let held = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/held", vec![0; 10])))
            .unwrap();
        let released = m
            .new_whole_file_cache(Arc::new(MemoryFileReader::new("r/gone", vec![0; 10])))
            .unwrap();
        warm(&held);
        warm(&released);
        drop(released);
        assert_eq!(m.len(), 2);

        // The released copy is still on disk, so it stays until evicted.
        assert_eq!(m.gc_by_disk_size(100).unwrap(), 0);
        assert_eq!(m.len(), 2);

        assert_eq!(m.gc_by_disk_size(0).unwrap(), 20);
        assert_eq!(m.len(), 1);
        assert!(!held.is_cached());
    }
}
