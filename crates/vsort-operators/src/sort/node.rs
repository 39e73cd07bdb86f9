//! The sort operator and its lifecycle.
//!
//! `open` drains the upstream producer: batches are accumulated, each
//! accumulated block is materialized and partially sorted, and (with a limit)
//! the top-N retention policy decides whether it is kept. `get_next` then
//! pulls globally ordered batches out of the merge engine, applying the
//! offset and the limit.

use std::fmt;
use std::mem;
use std::time::Instant;

use tracing::{debug, info, trace};
use vsort_core::prelude::{Block, Schema};

use crate::context::ExecContext;
use crate::expr::Expr;
use crate::plan::{Footprint, OpPlan};
use crate::traits::{BlockSource, ExecNode, OpError};

use super::accumulate::BlockAccumulator;
use super::description::{OrderByExpr, SortDescription};
use super::exprs::SortExecExprs;
use super::merge::{MergeEngine, RetainedBlock};
use super::partial::sort_block;
use super::stats::SortStats;
use super::topn::TopNRetention;

/// What to sort by and which slice of the ordered result to return.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOptions {
    pub order_by: Vec<OrderByExpr>,
    /// Output columns, when they differ from the input columns.
    pub projection: Option<Vec<Expr>>,
    /// `None` sorts everything.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SortOptions {
    pub fn new(order_by: Vec<OrderByExpr>) -> Self {
        Self {
            order_by,
            projection: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_projection(mut self, projection: Vec<Expr>) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Rows each block must keep sorted: `offset + limit`.
    fn rows_to_keep(&self) -> Option<usize> {
        self.limit.map(|l| l.saturating_add(self.offset))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Initialized,
    Prepared,
    Opened,
    Closed,
}

#[derive(Debug)]
pub struct SortNode {
    ctx: ExecContext,
    options: SortOptions,
    exprs: SortExecExprs,
    input_schema: Schema,
    output_schema: Schema,
    engine: Option<MergeEngine>,
    num_rows_returned: usize,
    reached_eos: bool,
    stats: SortStats,
    phase: Phase,
}

impl SortNode {
    pub fn new(ctx: ExecContext) -> Self {
        Self {
            ctx,
            options: SortOptions::new(Vec::new()),
            exprs: SortExecExprs::new(Vec::new(), None),
            input_schema: Schema::default(),
            output_schema: Schema::default(),
            engine: None,
            num_rows_returned: 0,
            reached_eos: false,
            stats: SortStats::default(),
            phase: Phase::Created,
        }
    }

    pub fn stats(&self) -> &SortStats {
        &self.stats
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn options(&self) -> &SortOptions {
        &self.options
    }

    fn expect_phase(&self, expected: Phase, call: &str) -> Result<(), OpError> {
        if self.phase != expected {
            return Err(OpError::State(format!(
                "{call} called in phase {:?}, expected {expected:?}",
                self.phase
            )));
        }
        Ok(())
    }

    fn memory_need(&self) -> Footprint {
        let columns = self.output_schema.len() + self.options.order_by.len();
        Footprint {
            bytes_per_row: (columns * mem::size_of::<vsort_core::prelude::Scalar>()) as u64,
            overhead_bytes: self.ctx.config.buffered_block_bytes as u64,
            max_retained_rows: self.options.rows_to_keep().map(|n| n as u64),
        }
    }

    /// Drain `upstream` into sorted, retained blocks.
    fn sort_input(
        &mut self,
        upstream: &mut dyn BlockSource,
    ) -> Result<(Vec<RetainedBlock>, SortDescription), OpError> {
        let cfg = &self.ctx.config;
        let rows_to_keep = self.options.rows_to_keep();
        let mut accumulator = BlockAccumulator::new(
            &self.input_schema,
            cfg.buffered_block_rows,
            cfg.buffered_block_bytes,
        );
        let mut retention = rows_to_keep.map(TopNRetention::new);
        let mut retained: Vec<RetainedBlock> = Vec::new();
        let mut description = SortDescription::default();

        loop {
            let round = accumulator.fill(upstream)?;
            self.stats.input_batches += round.batches;

            if let Some(mut block) = round.block {
                let rows = block.num_rows();
                let bytes = block.allocated_bytes();
                self.stats.input_rows += rows;
                self.stats.total_mem_usage += bytes;
                self.stats.sorted_blocks += 1;

                let started = Instant::now();
                let keys = self.exprs.materialize(&mut block)?;
                sort_block(&mut block, &keys, rows_to_keep);
                let elapsed = started.elapsed();
                self.stats.partial_sort_time += elapsed;
                description = keys;
                debug!(
                    rows,
                    bytes,
                    kept_rows = block.num_rows(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "partial sort"
                );

                let keep = match &retention {
                    Some(policy) => policy.should_retain(&block, &retained, &description),
                    None => !block.is_empty(),
                };
                if keep {
                    let guard = self.ctx.budget.acquire(block.allocated_bytes(), "sort_block")?;
                    retained.push(RetainedBlock::new(block, Some(guard)));
                    if let Some(policy) = retention.as_mut() {
                        policy.track(retained.len() - 1, &retained, &description);
                    }
                } else {
                    self.stats.discarded_blocks += 1;
                    debug!(rows, "discarding block outside top-n");
                }

                self.ctx.cancel.check("sort, while sorting input")?;
            }

            if round.eos {
                break;
            }
        }

        Ok((retained, description))
    }
}

impl ExecNode<SortOptions> for SortNode {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn init(&mut self, options: SortOptions) -> Result<(), OpError> {
        self.expect_phase(Phase::Created, "init")?;
        if options.order_by.is_empty() {
            return Err(OpError::Config(
                "sort requires at least one ordering expression".into(),
            ));
        }
        if matches!(&options.projection, Some(p) if p.is_empty()) {
            return Err(OpError::Config("projection must not be empty".into()));
        }
        self.exprs = SortExecExprs::new(options.order_by.clone(), options.projection.clone());
        self.stats.top_n = options.limit.is_some();
        self.options = options;
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn prepare(&mut self, input_schema: &Schema) -> Result<OpPlan, OpError> {
        self.expect_phase(Phase::Initialized, "prepare")?;
        self.output_schema = self.exprs.output_schema(input_schema)?;
        self.input_schema = input_schema.clone();
        self.phase = Phase::Prepared;

        let keys = self
            .options
            .order_by
            .iter()
            .map(|item| format!("{} {item}", item.expr))
            .collect();
        Ok(OpPlan::new(self.output_schema.clone(), self.memory_need()).with_sort_keys(keys))
    }

    fn open(&mut self, upstream: &mut dyn BlockSource) -> Result<(), OpError> {
        self.expect_phase(Phase::Prepared, "open")?;
        self.ctx.cancel.check("sort, while open")?;

        let (retained, description) = self.sort_input(upstream)?;
        self.stats.retained_blocks = retained.len();
        self.stats.peak_mem_bytes = self.ctx.budget.peak_bytes();
        info!(
            top_n = self.stats.top_n,
            input_rows = self.stats.input_rows,
            retained_blocks = self.stats.retained_blocks,
            discarded_blocks = self.stats.discarded_blocks,
            peak_mem_bytes = self.stats.peak_mem_bytes,
            "sort input consumed"
        );

        self.engine = Some(MergeEngine::new(
            retained,
            description,
            Block::empty(&self.output_schema),
            self.options.offset,
        ));
        self.phase = Phase::Opened;
        Ok(())
    }

    fn get_next(&mut self) -> Result<(Block, bool), OpError> {
        self.expect_phase(Phase::Opened, "get_next")?;
        if self.reached_eos {
            return Ok((Block::empty(&self.output_schema), true));
        }
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| OpError::State("merge engine missing after open".into()))?;

        let mut block = engine.next_batch(self.ctx.config.batch_size);
        let mut eos = block.is_empty();
        if let Some(limit) = self.options.limit {
            let remaining = limit.saturating_sub(self.num_rows_returned);
            if block.num_rows() >= remaining {
                block.truncate(remaining);
                eos = true;
            }
        }

        self.num_rows_returned += block.num_rows();
        self.stats.rows_returned = self.num_rows_returned;
        self.reached_eos = eos;
        trace!(rows = block.num_rows(), eos, "sort batch");
        Ok((block, eos))
    }

    fn reset(&mut self) -> Result<(), OpError> {
        if !matches!(self.phase, Phase::Prepared | Phase::Opened) {
            return Err(OpError::State(format!(
                "reset called in phase {:?}",
                self.phase
            )));
        }
        self.engine = None;
        self.num_rows_returned = 0;
        self.reached_eos = false;
        self.stats = SortStats {
            top_n: self.options.limit.is_some(),
            ..SortStats::default()
        };
        self.phase = Phase::Prepared;
        Ok(())
    }

    fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.engine = None;
        self.phase = Phase::Closed;
    }
}

impl fmt::Display for SortNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SortNode(")?;
        for (i, item) in self.options.order_by.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{item}")?;
        }
        if let Some(limit) = self.options.limit {
            write!(f, " limit={limit}")?;
        }
        if self.options.offset > 0 {
            write!(f, " offset={}", self.options.offset)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::traits::BlockStream;
    use vsort_core::config::SortConfig;
    use vsort_core::prelude::{Column, DataType, Field, Scalar};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("k", DataType::Int64, true),
            Field::new("v", DataType::Utf8, true),
        ])
    }

    fn batch(rows: &[(i64, &str)]) -> Block {
        Block::try_new(vec![
            Column::new("k", rows.iter().map(|r| Scalar::I64(r.0)).collect()),
            Column::new("v", rows.iter().map(|r| Scalar::Str(r.1.into())).collect()),
        ])
        .unwrap()
    }

    fn ctx(block_rows: usize, batch_size: usize) -> ExecContext {
        ExecContext::new(SortConfig {
            buffered_block_rows: block_rows,
            batch_size,
            ..Default::default()
        })
        .unwrap()
    }

    fn run(node: &mut SortNode, input: Vec<Block>) -> Vec<(i64, String)> {
        node.prepare(&schema()).unwrap();
        node.open(&mut BlockStream::new(input)).unwrap();
        let mut out = Vec::new();
        loop {
            let (b, eos) = node.get_next().unwrap();
            for r in 0..b.num_rows() {
                match (&b.columns[0].values[r], &b.columns[1].values[r]) {
                    (Scalar::I64(k), Scalar::Str(v)) => out.push((*k, v.clone())),
                    other => panic!("unexpected row {other:?}"),
                }
            }
            if eos {
                break;
            }
        }
        out
    }

    #[test]
    fn limit_and_offset_select_the_right_rows() {
        let mut node = SortNode::new(ctx(1024, 16));
        node.init(
            SortOptions::new(vec![OrderByExpr::asc(Expr::col("k"))])
                .with_limit(2)
                .with_offset(1),
        )
        .unwrap();
        let out = run(
            &mut node,
            vec![batch(&[(3, "c"), (1, "a"), (2, "b"), (5, "e"), (4, "d")])],
        );
        assert_eq!(out, vec![(2, "b".into()), (3, "c".into())]);
        assert_eq!(node.stats().rows_returned, 2);
    }

    #[test]
    fn small_blocks_merge_into_global_order() {
        let mut node = SortNode::new(ctx(2, 3));
        node.init(SortOptions::new(vec![OrderByExpr::desc(Expr::col("k"))]))
            .unwrap();
        let out = run(
            &mut node,
            vec![
                batch(&[(1, "a"), (7, "g")]),
                batch(&[(4, "d"), (2, "b")]),
                batch(&[(6, "f"), (3, "c"), (5, "e")]),
            ],
        );
        let keys: Vec<i64> = out.iter().map(|r| r.0).collect();
        assert_eq!(keys, vec![7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(node.stats().sorted_blocks, 3);
    }

    #[test]
    fn lifecycle_misuse_is_reported() {
        let mut node = SortNode::new(ctx(8, 8));
        assert!(matches!(node.get_next(), Err(OpError::State(_))));
        assert!(matches!(
            node.init(SortOptions::new(vec![])),
            Err(OpError::Config(_))
        ));
    }

    #[test]
    fn unknown_key_fails_at_prepare() {
        let mut node = SortNode::new(ctx(8, 8));
        node.init(SortOptions::new(vec![OrderByExpr::asc(Expr::col("missing"))]))
            .unwrap();
        assert!(matches!(node.prepare(&schema()), Err(OpError::Schema(_))));
    }

    #[test]
    fn cancellation_aborts_open() {
        let token = CancellationToken::new();
        let mut node = SortNode::new(ctx(1, 8).with_cancellation(token.clone()));
        node.init(SortOptions::new(vec![OrderByExpr::asc(Expr::col("k"))]))
            .unwrap();
        node.prepare(&schema()).unwrap();
        token.cancel();
        let err = node.open(&mut BlockStream::new(vec![batch(&[(1, "a")])]));
        assert!(matches!(err, Err(OpError::Cancelled(_))));
    }

    /// Hands out its blocks and cancels the query after the first one.
    struct CancelAfterFirst {
        blocks: Vec<Block>,
        token: CancellationToken,
    }

    impl BlockSource for CancelAfterFirst {
        fn next_block(&mut self) -> Result<Option<Block>, OpError> {
            if self.blocks.is_empty() {
                return Ok(None);
            }
            self.token.cancel();
            Ok(Some(self.blocks.remove(0)))
        }
    }

    #[test]
    fn cancellation_between_blocks_releases_memory() {
        use vsort_core::budget::MemoryBudget;

        let token = CancellationToken::new();
        let ctx = ctx(1, 8).with_cancellation(token.clone());
        let budget = ctx.budget.clone();
        let mut node = SortNode::new(ctx);
        node.init(SortOptions::new(vec![OrderByExpr::asc(Expr::col("k"))]))
            .unwrap();
        node.prepare(&schema()).unwrap();

        let mut source = CancelAfterFirst {
            blocks: vec![batch(&[(2, "b")]), batch(&[(1, "a")]), batch(&[(3, "c")])],
            token,
        };
        let err = node.open(&mut source);
        assert!(matches!(err, Err(OpError::Cancelled(_))));
        assert_eq!(source.blocks.len(), 2, "stopped after the first block");
        assert_eq!(node.stats().sorted_blocks, 1);

        drop(node);
        assert_eq!(budget.used_bytes(), 0);
    }

    #[test]
    fn memory_cap_surfaces_resource_exhausted() {
        let ctx = ExecContext::new(SortConfig {
            mem_cap_bytes: 16,
            ..Default::default()
        })
        .unwrap();
        let mut node = SortNode::new(ctx);
        node.init(SortOptions::new(vec![OrderByExpr::asc(Expr::col("k"))]))
            .unwrap();
        node.prepare(&schema()).unwrap();
        let err = node.open(&mut BlockStream::new(vec![batch(&[(1, "a"), (2, "b")])]));
        assert!(matches!(err, Err(OpError::ResourceExhausted { .. })));
    }

    #[test]
    fn reset_allows_reopening() {
        let mut node = SortNode::new(ctx(8, 8));
        node.init(SortOptions::new(vec![OrderByExpr::asc(Expr::col("k"))]).with_limit(1))
            .unwrap();
        let first = run(&mut node, vec![batch(&[(2, "b"), (1, "a")])]);
        node.reset().unwrap();
        node.open(&mut BlockStream::new(vec![batch(&[(9, "z"), (8, "y")])]))
            .unwrap();
        let (b, eos) = node.get_next().unwrap();
        assert_eq!(first, vec![(1, "a".into())]);
        assert_eq!(b.columns[0].values, vec![Scalar::I64(8)]);
        assert!(eos);
    }

    #[test]
    fn display_lists_directions() {
        let mut node = SortNode::new(ctx(8, 8));
        node.init(
            SortOptions::new(vec![
                OrderByExpr::asc(Expr::col("k")),
                OrderByExpr::desc(Expr::col("v")).nulls_first(true),
            ])
            .with_limit(5),
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            "SortNode(asc nulls first desc nulls first limit=5)"
        );
        assert_eq!(node.name(), "sort");
    }
}
