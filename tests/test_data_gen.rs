//! Deterministic data generation shared by the integration tests.
#![allow(dead_code)]

use std::cmp::Ordering;

use vsort_core::prelude::{Block, Column, DataType, Field, Scalar, Schema};
use vsort_operators::{ExecNode, SortNode};

/// Small linear congruential generator; same seed, same data.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }
}

/// `k` (nullable key), `id` (unique row id), `tag` (payload).
pub fn schema() -> Schema {
    Schema::new(vec![
        Field::new("k", DataType::Int64, true),
        Field::new("id", DataType::Int64, false),
        Field::new("tag", DataType::Utf8, false),
    ])
}

/// `rows` rows in batches of `batch_rows`. Keys come from `0..key_range`;
/// roughly one key in `null_every` is null (`0` disables nulls).
pub fn generate_batches(
    rows: usize,
    batch_rows: usize,
    key_range: u64,
    null_every: u64,
    seed: u64,
) -> Vec<Block> {
    let mut rng = Lcg::new(seed);
    let mut out = Vec::new();
    let mut id = 0i64;
    while (id as usize) < rows {
        let n = batch_rows.min(rows - id as usize);
        let mut keys = Vec::with_capacity(n);
        let mut ids = Vec::with_capacity(n);
        let mut tags = Vec::with_capacity(n);
        for _ in 0..n {
            let key = if null_every > 0 && rng.below(null_every) == 0 {
                Scalar::Null
            } else {
                Scalar::I64(rng.below(key_range) as i64)
            };
            keys.push(key);
            ids.push(Scalar::I64(id));
            tags.push(Scalar::Str(format!("row-{id}")));
            id += 1;
        }
        out.push(
            Block::try_new(vec![
                Column::new("k", keys),
                Column::new("id", ids),
                Column::new("tag", tags),
            ])
            .expect("valid block"),
        );
    }
    out
}

/// `(column, ascending, nulls_first)` per key.
pub type KeySpec = [(usize, bool, bool)];

pub fn compare(a: &[Scalar], b: &[Scalar], keys: &KeySpec) -> Ordering {
    for &(col, asc, nulls_first) in keys {
        let ord = match (a[col].is_null(), b[col].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let o = a[col].compare_values(&b[col]);
                if asc {
                    o
                } else {
                    o.reverse()
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub fn rows_of(blocks: &[Block]) -> Vec<Vec<Scalar>> {
    blocks
        .iter()
        .flat_map(|b| (0..b.num_rows()).map(move |r| b.row(r)))
        .collect()
}

/// Full in-memory sort of every input row.
pub fn reference_order(batches: &[Block], keys: &KeySpec) -> Vec<Vec<Scalar>> {
    let mut rows = rows_of(batches);
    rows.sort_by(|a, b| compare(a, b, keys));
    rows
}

/// Project `rows` onto the key columns, for comparisons that ignore ties.
pub fn key_values(rows: &[Vec<Scalar>], keys: &KeySpec) -> Vec<Vec<Scalar>> {
    rows.iter()
        .map(|r| keys.iter().map(|&(c, _, _)| r[c].clone()).collect())
        .collect()
}

/// Pull every batch out of an opened node.
pub fn drain(node: &mut SortNode) -> Vec<Block> {
    let mut out = Vec::new();
    loop {
        let (block, eos) = node.get_next().expect("get_next failed");
        if !block.is_empty() {
            out.push(block);
        }
        if eos {
            return out;
        }
    }
}
