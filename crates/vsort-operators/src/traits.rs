//! Operator trait + common interfaces.
//!
//! The harness calls `init(...)`, then `prepare(...)` to obtain an `OpPlan`
//! (output schema, footprint), `open(...)` with the upstream producer, and
//! finally `get_next()` until end-of-stream.

use std::fmt::Display;

use vsort_core::prelude::{Block, Schema};

use thiserror::Error;

use crate::plan::OpPlan;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("planning error: {0}")]
    Plan(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("expression evaluation error: {0}")]
    ExpressionEvaluation(String),

    #[error("upstream read error: {0}")]
    UpstreamRead(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("resource exhausted: requested {requested} bytes, capacity {capacity}, used {used}")]
    ResourceExhausted {
        requested: usize,
        capacity: usize,
        used: usize,
    },

    #[error("invalid operator state: {0}")]
    State(String),
}

impl From<vsort_core::Error> for OpError {
    fn from(e: vsort_core::Error) -> Self {
        match e {
            vsort_core::Error::Config(msg) => OpError::Config(msg),
            other => OpError::Schema(other.to_string()),
        }
    }
}

impl From<vsort_mem::Error> for OpError {
    fn from(e: vsort_mem::Error) -> Self {
        match e {
            vsort_mem::Error::BudgetExceeded {
                requested,
                capacity,
                used,
                ..
            } => OpError::ResourceExhausted {
                requested,
                capacity,
                used,
            },
        }
    }
}

/// Upstream producer of blocks.
///
/// `Ok(None)` signals end-of-stream. Implementations report their own
/// failures as `OpError::UpstreamRead`.
pub trait BlockSource {
    fn next_block(&mut self) -> Result<Option<Block>, OpError>;
}

/// In-memory stream of blocks, consumed front to back.
#[derive(Debug, Default)]
pub struct BlockStream {
    blocks: std::collections::VecDeque<Block>,
}

impl BlockStream {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks: blocks.into(),
        }
    }
}

impl BlockSource for BlockStream {
    fn next_block(&mut self) -> Result<Option<Block>, OpError> {
        Ok(self.blocks.pop_front())
    }
}

/// Adapts any fallible iterator of blocks (e.g. a file reader) into a source.
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I, E> BlockSource for IterSource<I>
where
    I: Iterator<Item = Result<Block, E>>,
    E: Display,
{
    fn next_block(&mut self) -> Result<Option<Block>, OpError> {
        self.inner
            .next()
            .transpose()
            .map_err(|e| OpError::UpstreamRead(e.to_string()))
    }
}

/// Lifecycle of a pull-based execution node.
///
/// Invariants:
/// - Calls follow `init → prepare → open → get_next* → close`; `reset`
///   returns a node to the prepared state so it can be opened again.
/// - `get_next` returns an output batch plus an end-of-stream flag.
pub trait ExecNode<Options> {
    /// Human-readable node name (stable).
    fn name(&self) -> &'static str;

    fn init(&mut self, options: Options) -> Result<(), OpError>;

    /// Bind to the input schema and return the concrete plan.
    fn prepare(&mut self, input_schema: &Schema) -> Result<OpPlan, OpError>;

    fn open(&mut self, upstream: &mut dyn BlockSource) -> Result<(), OpError>;

    fn get_next(&mut self) -> Result<(Block, bool), OpError>;

    fn reset(&mut self) -> Result<(), OpError>;

    fn close(&mut self);
}
