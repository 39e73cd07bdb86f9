//! Profile counters for one sort operator instance.

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SortStats {
    /// A limit is active and the top-N retention policy is in use.
    pub top_n: bool,
    /// Non-empty upstream batches consumed.
    pub input_batches: usize,
    pub input_rows: usize,
    /// Accumulated blocks handed to the partial sorter.
    pub sorted_blocks: usize,
    pub retained_blocks: usize,
    pub discarded_blocks: usize,
    pub rows_returned: usize,
    /// Sum of the byte sizes of every accumulated block.
    pub total_mem_usage: usize,
    pub peak_mem_bytes: usize,
    pub partial_sort_time: Duration,
}
