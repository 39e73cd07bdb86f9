//! Streaming readers that produce `Block` batches.

pub mod csv;
