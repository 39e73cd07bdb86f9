#![forbid(unsafe_code)]
//! vsort-mem: hard memory budgeting and peak tracking.
//!
//! Concrete implementations of the interfaces in `vsort-core::budget`. The
//! sort operator charges every block it keeps alive against a
//! `MemoryBudgetImpl`; the RAII guard returns the bytes when the block is
//! dropped or discarded.

pub mod error;
pub mod guard;
pub mod tracking;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use tracking::PeakTracker;
