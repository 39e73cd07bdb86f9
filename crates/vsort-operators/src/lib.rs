#![forbid(unsafe_code)]
//! vsort-operators: the expression layer and the streaming sort operator.
//!
//! Design intent:
//! - Pure and synchronous; the caller drives the operator through its
//!   `init → prepare → open → get_next* → close` lifecycle.
//! - Every block the operator keeps alive is charged against the
//!   `vsort-mem` budget carried by the `ExecContext`.
//! - The operator exposes a planning surface (`OpPlan`) with an estimated
//!   footprint model so callers can size budgets.

pub mod context;
pub mod expr;
pub mod plan;
pub mod sort;
pub mod traits;

pub use context::{CancellationToken, ExecContext};
pub use expr::{BinaryOp, Expr};
pub use plan::{Footprint, OpPlan};
pub use sort::{OrderByExpr, SortNode, SortOptions, SortStats};
pub use traits::{BlockSource, BlockStream, ExecNode, IterSource, OpError};
