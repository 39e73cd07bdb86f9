//! Concrete `FileReader`s and a sequential `Read` adapter over them.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;

use super::{FileReader, FileReaderRef};

/// Local filesystem file. The size is captured at open time.
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }
}

impl FileReader for LocalFileReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = f.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// In-memory file, used to stand in for remote storage in tests.
///
/// Counts `read_at` calls so callers can tell cache hits from misses.
#[derive(Debug)]
pub struct MemoryFileReader {
    path: PathBuf,
    data: Arc<Vec<u8>>,
    reads: AtomicUsize,
}

impl MemoryFileReader {
    pub fn new(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data: Arc::new(data),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl FileReader for MemoryFileReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let start = (offset as usize).min(self.data.len());
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        Ok(n)
    }
}

/// Reads a `FileReader` front to back through `std::io::Read`.
pub struct SequentialReader {
    inner: FileReaderRef,
    pos: u64,
}

impl SequentialReader {
    pub fn new(inner: FileReaderRef) -> Self {
        Self { inner, pos: 0 }
    }
}

impl Read for SequentialReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .inner
            .read_at(self.pos, buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.pos += n as u64;
        Ok(n)
    }
}
