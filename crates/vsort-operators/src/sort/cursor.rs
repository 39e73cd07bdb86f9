//! Cursors over sorted blocks.
//!
//! A `SortCursor` is a row position inside one retained block. It never owns
//! the block: it stores the block's index in the retained list and callers
//! hand the block back in when comparing. `BlockBoundary` exposes the first
//! and last rows of a sorted block for whole-block pruning decisions.

use std::cmp::Ordering;

use vsort_core::prelude::Block;

use super::description::SortDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCursor {
    /// Index of the backing block in the retained list; also the tie-breaker.
    order: usize,
    pos: usize,
    rows: usize,
}

impl SortCursor {
    pub fn new(order: usize, rows: usize) -> Self {
        Self {
            order,
            pos: 0,
            rows,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// True once the cursor has moved past the last row.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.rows
    }

    pub fn is_last(&self) -> bool {
        self.pos + 1 >= self.rows
    }

    pub fn next(&mut self) {
        self.pos += 1;
    }

    /// Compare current rows; equal keys fall back to block order so the merge
    /// is deterministic.
    pub fn compare(
        &self,
        block: &Block,
        other: &SortCursor,
        other_block: &Block,
        desc: &SortDescription,
    ) -> Ordering {
        desc.compare_rows(block, self.pos, other_block, other.pos)
            .then_with(|| self.order.cmp(&other.order))
    }
}

/// First and last row of a sorted, non-empty block.
#[derive(Debug, Clone, Copy)]
pub struct BlockBoundary<'a> {
    block: &'a Block,
}

impl<'a> BlockBoundary<'a> {
    /// `None` for an empty block, which has no boundary rows.
    pub fn new(block: &'a Block) -> Option<Self> {
        (!block.is_empty()).then_some(Self { block })
    }

    pub fn rows(&self) -> usize {
        self.block.num_rows()
    }

    fn last(&self) -> usize {
        self.block.num_rows() - 1
    }

    /// Order two blocks by their last (largest retained) row.
    pub fn compare_last(&self, other: &BlockBoundary<'_>, desc: &SortDescription) -> Ordering {
        desc.compare_rows(self.block, self.last(), other.block, other.last())
    }

    /// Every row of `self` sorts strictly after every row of `other`.
    ///
    /// Both blocks are sorted, so this reduces to our first row against their
    /// last row. Ties are not "greater", which keeps equal keys retained.
    pub fn totally_greater(&self, other: &BlockBoundary<'_>, desc: &SortDescription) -> bool {
        desc.compare_rows(self.block, 0, other.block, other.last()) == Ordering::Greater
    }
}
