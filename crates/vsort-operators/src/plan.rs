//! Operator planning surfaces: `Footprint` and `OpPlan`.

use vsort_core::prelude::Schema;
use serde::{Deserialize, Serialize};

/// Coarse memory model for a block flowing through an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Estimated bytes per row held by this operator.
    pub bytes_per_row: u64,
    /// Estimated additional overhead (buffers, heaps) per query.
    pub overhead_bytes: u64,
    /// Rows the operator aims to retain when it prunes (top-N). Ties on the
    /// boundary key can push the real count above it.
    pub max_retained_rows: Option<u64>,
}

impl Footprint {
    /// Estimate total live bytes when `rows` rows flow through this operator.
    pub fn estimate_live(&self, rows: u64) -> u64 {
        let rows = match self.max_retained_rows {
            Some(cap) => rows.min(cap),
            None => rows,
        };
        self.overhead_bytes + self.bytes_per_row.saturating_mul(rows)
    }
}

/// Operator plan: output schema, ordering keys and a cached footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpPlan {
    pub output_schema: Schema,

    /// Display names of the ordering keys, in priority order.
    pub sort_keys: Vec<String>,

    /// Footprint model cached to avoid recomputation.
    pub footprint: Footprint,
}

impl OpPlan {
    pub fn new(output_schema: Schema, footprint: Footprint) -> Self {
        Self {
            output_schema,
            sort_keys: vec![],
            footprint,
        }
    }

    pub fn with_sort_keys(mut self, keys: Vec<String>) -> Self {
        self.sort_keys = keys;
        self
    }
}
