//! In-block sorting.
//!
//! Rows are ordered through a permutation vector and then gathered, so the
//! comparator touches only key columns. Equal keys fall back to the original
//! row position, which makes the result deterministic and sorting an already
//! sorted block a no-op.

use std::cmp::Ordering;

use vsort_core::prelude::Block;

use super::description::SortDescription;

/// Sort `block` by `desc`.
///
/// With `limit = Some(n)` only the first `n` rows are put in final position
/// and the block is truncated to them; the rest is never fully sorted.
pub fn sort_block(block: &mut Block, desc: &SortDescription, limit: Option<usize>) {
    let rows = block.num_rows();
    if rows == 0 {
        return;
    }

    let mut perm: Vec<usize> = (0..rows).collect();
    {
        let view: &Block = block;
        let cmp = |a: &usize, b: &usize| -> Ordering {
            desc.compare_rows(view, *a, view, *b).then_with(|| a.cmp(b))
        };

        match limit {
            Some(0) => perm.clear(),
            Some(n) if n < rows => {
                perm.select_nth_unstable_by(n - 1, cmp);
                perm.truncate(n);
                perm.sort_unstable_by(cmp);
            }
            _ => perm.sort_unstable_by(cmp),
        }
    }

    let identity = perm.len() == rows && perm.iter().enumerate().all(|(i, &p)| i == p);
    if !identity {
        block.take(&perm);
    }
}

/// True if consecutive rows never decrease under `desc`.
pub fn is_sorted(block: &Block, desc: &SortDescription) -> bool {
    (1..block.num_rows()).all(|i| desc.compare_rows(block, i - 1, block, i) != Ordering::Greater)
}
