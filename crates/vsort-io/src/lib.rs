#![forbid(unsafe_code)]
//! vsort-io: file access for the vsort engine.
//!
//! - `cache`: positional `FileReader`s and a local disk cache for remote
//!   files, where a `_DONE` marker next to each cached copy is the only
//!   signal that the copy is complete.
//! - `readers`: CSV files decoded into typed `Block`s.
//! - `writers`: NDJSON output of `Block`s.

pub mod cache;
pub mod error;
pub mod readers;
pub mod writers;

pub use cache::{
    download_cache_to_local, FileCache, FileCacheConfig, FileCacheManager, FileReader,
    FileReaderRef, LocalFileReader, MemoryFileReader, SequentialReader, WholeFileCache,
    CACHE_DONE_FILE_SUFFIX,
};
pub use error::{Error, Result};
pub use readers::csv::CsvBlockReader;
pub use writers::jsonl::JsonlWriter;
