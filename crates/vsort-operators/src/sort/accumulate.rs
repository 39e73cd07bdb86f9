//! Block accumulation ahead of the partial sorter.
//!
//! Sorting many tiny upstream batches one by one wastes comparator and
//! allocation work, so batches are merged into one buffer until a row or
//! byte ceiling is hit or upstream runs dry.

use vsort_core::prelude::{Block, MutableBlock, Schema};

use crate::traits::{BlockSource, OpError};

/// Result of one `fill` round.
#[derive(Debug)]
pub struct Accumulated {
    /// The flushed block, `None` if no rows arrived this round.
    pub block: Option<Block>,
    /// Upstream signalled end-of-stream.
    pub eos: bool,
    /// Upstream batches merged this round.
    pub batches: usize,
}

#[derive(Debug)]
pub struct BlockAccumulator {
    buffer: MutableBlock,
    max_rows: usize,
    max_bytes: usize,
}

impl BlockAccumulator {
    pub fn new(schema: &Schema, max_rows: usize, max_bytes: usize) -> Self {
        Self {
            buffer: MutableBlock::new(schema),
            max_rows,
            max_bytes,
        }
    }

    /// Pull from `source` until a ceiling is reached or upstream is exhausted.
    ///
    /// The buffer is left empty (same layout) after a flush, ready for the
    /// next round.
    pub fn fill(&mut self, source: &mut dyn BlockSource) -> Result<Accumulated, OpError> {
        let mut eos = false;
        let mut batches = 0;
        loop {
            match source.next_block()? {
                Some(batch) => {
                    if !batch.is_empty() {
                        self.buffer.merge(batch)?;
                        batches += 1;
                    }
                }
                None => eos = true,
            }
            if eos
                || self.buffer.rows() >= self.max_rows
                || self.buffer.allocated_bytes() >= self.max_bytes
            {
                break;
            }
        }

        let block = (self.buffer.rows() > 0).then(|| self.buffer.to_block());
        Ok(Accumulated {
            block,
            eos,
            batches,
        })
    }

    /// Bytes currently buffered but not yet flushed.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.allocated_bytes()
    }
}
