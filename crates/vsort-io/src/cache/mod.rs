//! Local disk cache for remote files.
//!
//! A cached copy lives at `<cache_file>` and is only trusted once the empty
//! sibling marker `<cache_file>_DONE` exists. Downloads write the data first
//! and create the marker last, so a crash mid-download leaves a file without
//! a marker, which is treated as absent and later garbage collected.

mod config;
mod manager;
mod reader;
mod whole_file;

pub use config::FileCacheConfig;
pub use manager::FileCacheManager;
pub use reader::{LocalFileReader, MemoryFileReader, SequentialReader};
pub use whole_file::WholeFileCache;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Suffix of the completeness marker created next to a cached file.
pub const CACHE_DONE_FILE_SUFFIX: &str = "_DONE";

const CACHE_KEY_LEN: usize = 16;
const COPY_CHUNK_BYTES: usize = 1024 * 1024;

/// Positional, read-only access to a file.
pub trait FileReader: Send + Sync {
    fn path(&self) -> &Path;

    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`. Returns 0 at end of file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

pub type FileReaderRef = Arc<dyn FileReader>;

/// A `FileReader` backed by a local copy of a remote file.
pub trait FileCache: FileReader {
    fn cache_dir(&self) -> &Path;

    /// Bytes currently held on local disk.
    fn cache_file_size(&self) -> u64;

    fn remote_file_reader(&self) -> FileReaderRef;

    /// Last time the cached copy served a read, if it ever did.
    fn last_access(&self) -> Option<Instant>;

    /// Drop the local copy if it has been idle past the alive time.
    fn clean_timeout_cache(&self) -> Result<()>;

    fn clean_all_cache(&self) -> Result<()>;
}

/// `<cache_file>_DONE`.
pub fn done_file_path(cache_file: &Path) -> PathBuf {
    let mut name = OsString::from(cache_file.as_os_str());
    name.push(CACHE_DONE_FILE_SUFFIX);
    PathBuf::from(name)
}

/// Copy `req_size` bytes at `offset` of `remote` into `cache_file`, then
/// create `done_file`.
///
/// A stale marker is removed before writing. On failure the partial data
/// file is removed and no marker is left behind.
pub fn download_cache_to_local(
    cache_file: &Path,
    done_file: &Path,
    remote: &dyn FileReader,
    req_size: usize,
    offset: u64,
) -> Result<()> {
    let started = Instant::now();
    if let Some(parent) = cache_file.parent() {
        fs::create_dir_all(parent)?;
    }
    if done_file.exists() {
        fs::remove_file(done_file)?;
    }

    if let Err(e) = copy_range(cache_file, remote, req_size, offset) {
        warn!(
            remote = %remote.path().display(),
            cache_file = %cache_file.display(),
            error = %e,
            "cache download failed"
        );
        if cache_file.exists() {
            let _ = fs::remove_file(cache_file);
        }
        return Err(e);
    }

    File::create(done_file)?;
    debug!(
        remote = %remote.path().display(),
        cache_file = %cache_file.display(),
        bytes = req_size,
        offset,
        elapsed_us = started.elapsed().as_micros() as u64,
        "cached remote file"
    );
    Ok(())
}

fn copy_range(cache_file: &Path, remote: &dyn FileReader, req_size: usize, offset: u64) -> Result<()> {
    let mut out = BufWriter::new(File::create(cache_file)?);
    let mut buf = vec![0u8; req_size.clamp(1, COPY_CHUNK_BYTES)];
    let mut copied = 0usize;
    while copied < req_size {
        let want = (req_size - copied).min(buf.len());
        let n = remote.read_at(offset + copied as u64, &mut buf[..want])?;
        if n == 0 {
            return Err(Error::Cache(format!(
                "short read from {}: wanted {req_size} bytes at offset {offset}, got {copied}",
                remote.path().display()
            )));
        }
        out.write_all(&buf[..n])?;
        copied += n;
    }
    let file = out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// Stable directory name for the cache of `remote_path`.
pub(crate) fn cache_key(remote_path: &Path) -> String {
    let hash = blake3::hash(remote_path.as_os_str().to_string_lossy().as_bytes());
    hash.to_hex()[..CACHE_KEY_LEN].to_string()
}

/// Directory names produced by `cache_key`.
pub(crate) fn is_cache_key(name: &str) -> bool {
    name.len() == CACHE_KEY_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
