#![forbid(unsafe_code)]
//! vsort-core: blocks, columns, schemas and configuration shared by every
//! vsort crate.
//!
//! Pure data only. Memory enforcement lives in `vsort-mem`, file access in
//! `vsort-io` and the sort operator itself in `vsort-operators`.

pub mod budget;
pub mod config;
pub mod error;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
