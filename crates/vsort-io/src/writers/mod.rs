//! Streaming writers that consume `Block` batches.

pub mod jsonl;
