//! Top-N retention policy.
//!
//! With a limit, only the first `offset + limit` rows of the global order can
//! ever be emitted. Every partially sorted block is truncated to that many
//! rows, and whole blocks are dropped when they provably cannot contribute:
//! a max-heap over retained blocks (keyed by each block's last row) tracks a
//! set of blocks covering at least `offset + limit` rows. A new block whose
//! first row sorts strictly after the heap top's last row has at least that
//! many retained rows ahead of every one of its rows and is discarded.
//!
//! The heap is kept minimal: while the other entries still cover the row
//! target without the top block, the top is popped, which tightens the bound.
//! Popped blocks stay retained; only the heap forgets them.

use vsort_core::prelude::Block;

use super::cursor::BlockBoundary;
use super::description::SortDescription;
use super::heap::IndexHeap;

#[derive(Debug)]
pub struct TopNRetention {
    rows_to_keep: usize,
    heap: IndexHeap,
    heap_rows: usize,
}

impl TopNRetention {
    pub fn new(rows_to_keep: usize) -> Self {
        Self {
            rows_to_keep,
            heap: IndexHeap::new(),
            heap_rows: 0,
        }
    }

    pub fn rows_to_keep(&self) -> usize {
        self.rows_to_keep
    }

    /// Rows covered by the blocks currently on the boundary heap.
    pub fn heap_rows(&self) -> usize {
        self.heap_rows
    }

    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Decide whether a freshly sorted `block` must be kept.
    ///
    /// `retained` is indexed by the handles passed to [`Self::track`].
    pub fn should_retain<B: AsRef<Block>>(
        &self,
        block: &Block,
        retained: &[B],
        desc: &SortDescription,
    ) -> bool {
        let Some(candidate) = BlockBoundary::new(block) else {
            return false;
        };
        if self.heap_rows < self.rows_to_keep {
            return true;
        }
        let Some(top) = self
            .heap
            .peek()
            .and_then(|h| BlockBoundary::new(retained[h].as_ref()))
        else {
            return true;
        };
        !candidate.totally_greater(&top, desc)
    }

    /// Register `retained[handle]`, which the caller has just kept.
    pub fn track<B: AsRef<Block>>(&mut self, handle: usize, retained: &[B], desc: &SortDescription) {
        let rows = retained[handle].as_ref().num_rows();
        if rows == 0 {
            return;
        }
        let later = |a: usize, b: usize| later_last_row(retained, a, b, desc);
        self.heap.push(handle, later);
        self.heap_rows += rows;

        while let Some(top) = self.heap.peek() {
            let top_rows = retained[top].as_ref().num_rows();
            if self.heap_rows - top_rows < self.rows_to_keep {
                break;
            }
            self.heap.pop(later);
            self.heap_rows -= top_rows;
        }
    }
}

fn later_last_row<B: AsRef<Block>>(
    retained: &[B],
    a: usize,
    b: usize,
    desc: &SortDescription,
) -> bool {
    match (
        BlockBoundary::new(retained[a].as_ref()),
        BlockBoundary::new(retained[b].as_ref()),
    ) {
        (Some(x), Some(y)) => x.compare_last(&y, desc).then(b.cmp(&a)).is_gt(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::description::SortColumnDescription;
    use vsort_core::prelude::{Column, Scalar};

    fn ints(v: &[i64]) -> Block {
        Block::try_new(vec![Column::new(
            "k",
            v.iter().map(|&x| Scalar::I64(x)).collect(),
        )])
        .unwrap()
    }

    fn asc() -> SortDescription {
        SortDescription::new(vec![SortColumnDescription::new(0, true, true)])
    }

    fn offer(policy: &mut TopNRetention, kept: &mut Vec<Block>, block: Block) -> bool {
        if !policy.should_retain(&block, kept, &asc()) {
            return false;
        }
        kept.push(block);
        policy.track(kept.len() - 1, kept, &asc());
        true
    }

    #[test]
    fn retains_until_target_then_prunes_greater_blocks() {
        let mut policy = TopNRetention::new(3);
        let mut kept = Vec::new();
        assert!(offer(&mut policy, &mut kept, ints(&[10, 20])));
        assert!(offer(&mut policy, &mut kept, ints(&[30, 40])));
        // 4 rows tracked, bound is 40.
        assert!(!offer(&mut policy, &mut kept, ints(&[41, 50])));
        assert!(offer(&mut policy, &mut kept, ints(&[40, 45])));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn heap_shrinks_to_tighten_bound() {
        let mut policy = TopNRetention::new(2);
        let mut kept = Vec::new();
        assert!(offer(&mut policy, &mut kept, ints(&[50, 90])));
        assert!(offer(&mut policy, &mut kept, ints(&[1, 2])));
        // [1, 2] alone covers the target, so the bound dropped to 2.
        assert_eq!(policy.heap_len(), 1);
        assert_eq!(policy.heap_rows(), 2);
        assert!(!offer(&mut policy, &mut kept, ints(&[3, 4])));
        assert!(offer(&mut policy, &mut kept, ints(&[2, 3])));
    }

    #[test]
    fn ties_are_never_discarded() {
        let mut policy = TopNRetention::new(1);
        let mut kept = Vec::new();
        assert!(offer(&mut policy, &mut kept, ints(&[5])));
        assert!(offer(&mut policy, &mut kept, ints(&[5])));
    }

    #[test]
    fn empty_blocks_are_dropped() {
        let policy = TopNRetention::new(3);
        let kept: Vec<Block> = Vec::new();
        assert!(!policy.should_retain(&ints(&[]), &kept, &asc()));
    }
}
