//! Streaming, bounded-memory sort with top-N pruning and k-way merge.
//!
//! Pipeline per query:
//! materialize keys → accumulate → partial sort → retain/discard (top-N)
//! → merge retained blocks on demand in `get_next`.

pub mod accumulate;
pub mod cursor;
pub mod description;
pub mod exprs;
pub mod heap;
pub mod merge;
pub mod node;
pub mod partial;
pub mod stats;
pub mod topn;

pub use description::{OrderByExpr, SortColumnDescription, SortDescription};
pub use exprs::SortExecExprs;
pub use merge::{MergeEngine, MergeState, RetainedBlock};
pub use node::{SortNode, SortOptions};
pub use stats::SortStats;
