//! K-way merge over retained blocks.
//!
//! Each retained block is internally sorted. One `SortCursor` per block is
//! seeded into a min-heap (handles into the cursor arena) and rows are
//! pulled out in global order, one output batch per call. A single retained
//! block is already the final order and is sliced directly.

use vsort_core::prelude::{Block, MutableBlock};
use vsort_mem::BudgetGuardImpl;

use super::cursor::SortCursor;
use super::description::SortDescription;
use super::heap::IndexHeap;

/// A block that survived retention, with the budget guard paying for it.
#[derive(Debug)]
pub struct RetainedBlock {
    block: Block,
    guard: Option<BudgetGuardImpl>,
}

impl RetainedBlock {
    pub fn new(block: Block, guard: Option<BudgetGuardImpl>) -> Self {
        Self { block, guard }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Drop the rows and hand the accounted bytes back to the budget.
    fn release(&mut self) {
        self.block = Block::default();
        self.guard = None;
    }
}

impl AsRef<Block> for RetainedBlock {
    fn as_ref(&self) -> &Block {
        &self.block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    Streaming,
    Exhausted,
}

#[derive(Debug)]
pub struct MergeEngine {
    blocks: Vec<RetainedBlock>,
    desc: SortDescription,
    /// Empty block with the output columns; retained blocks may carry extra
    /// trailing key columns that are never emitted.
    template: Block,
    cursors: Vec<SortCursor>,
    queue: IndexHeap,
    pending_offset: usize,
    state: MergeState,
}

impl MergeEngine {
    pub fn new(
        blocks: Vec<RetainedBlock>,
        desc: SortDescription,
        template: Block,
        offset: usize,
    ) -> Self {
        Self {
            blocks,
            desc,
            template,
            cursors: Vec::new(),
            queue: IndexHeap::new(),
            pending_offset: offset,
            state: MergeState::Idle,
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Leading rows still to be skipped.
    pub fn pending_offset(&self) -> usize {
        self.pending_offset
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Emit up to `batch_size` rows in global order.
    ///
    /// An empty result means the merge is exhausted.
    pub fn next_batch(&mut self, batch_size: usize) -> Block {
        if self.state == MergeState::Idle {
            self.start();
        }
        if self.state == MergeState::Exhausted {
            return self.template.clone();
        }

        let out = if self.blocks.len() == 1 {
            self.next_single(batch_size)
        } else {
            self.next_merged(batch_size)
        };

        if out.is_empty() {
            self.state = MergeState::Exhausted;
            return self.template.clone();
        }
        out
    }

    fn start(&mut self) {
        if self.blocks.len() == 1 {
            let width = self.template.num_columns();
            let block = &mut self.blocks[0].block;
            block.skip_rows(self.pending_offset);
            block.truncate_columns(width);
            self.pending_offset = 0;
        } else {
            self.cursors.reserve(self.blocks.len());
            for (i, retained) in self.blocks.iter().enumerate() {
                let rows = retained.block.num_rows();
                if rows > 0 {
                    self.cursors.push(SortCursor::new(i, rows));
                }
            }
            let (cursors, blocks, desc) = (&self.cursors, &self.blocks, &self.desc);
            for handle in 0..cursors.len() {
                self.queue
                    .push(handle, |a, b| cursor_before(cursors, blocks, desc, a, b));
            }
        }
        self.state = MergeState::Streaming;
    }

    fn next_single(&mut self, batch_size: usize) -> Block {
        let retained = &mut self.blocks[0];
        let out = retained.block.split_front(batch_size);
        if retained.block.is_empty() {
            retained.release();
        }
        out
    }

    fn next_merged(&mut self, batch_size: usize) -> Block {
        let mut out = MutableBlock::empty_like(&self.template);

        while let Some(top) = self.queue.peek() {
            let cursor = self.cursors[top];
            if self.pending_offset > 0 {
                self.pending_offset -= 1;
            } else {
                out.insert_row_from(&self.blocks[cursor.order()].block, cursor.pos());
            }

            if cursor.is_last() {
                let (cursors, blocks, desc) = (&self.cursors, &self.blocks, &self.desc);
                self.queue
                    .pop(|a, b| cursor_before(cursors, blocks, desc, a, b));
                self.blocks[cursor.order()].release();
            } else {
                self.cursors[top].next();
                let (cursors, blocks, desc) = (&self.cursors, &self.blocks, &self.desc);
                self.queue
                    .update_top(|a, b| cursor_before(cursors, blocks, desc, a, b));
            }

            if out.rows() >= batch_size {
                break;
            }
        }

        out.to_block()
    }
}

fn cursor_before(
    cursors: &[SortCursor],
    blocks: &[RetainedBlock],
    desc: &SortDescription,
    a: usize,
    b: usize,
) -> bool {
    let (x, y) = (&cursors[a], &cursors[b]);
    x.compare(&blocks[x.order()].block, y, &blocks[y.order()].block, desc)
        .is_lt()
}
