//! Sort-key materialization.
//!
//! Before a block is sorted, the optional output projection is applied (the
//! block is rewritten to exactly the projected columns) and then every
//! ordering expression is evaluated, appending derived key columns where the
//! key is not a plain column. The returned `SortDescription` points at the key
//! columns; everything past the projected width is a key column.

use vsort_core::prelude::{Block, Column, Field, Schema};

use crate::expr::Expr;
use crate::traits::OpError;

use super::description::{OrderByExpr, SortColumnDescription, SortDescription};

#[derive(Debug, Clone, PartialEq)]
pub struct SortExecExprs {
    ordering: Vec<OrderByExpr>,
    projection: Option<Vec<Expr>>,
}

impl SortExecExprs {
    pub fn new(ordering: Vec<OrderByExpr>, projection: Option<Vec<Expr>>) -> Self {
        Self {
            ordering,
            projection,
        }
    }

    pub fn ordering(&self) -> &[OrderByExpr] {
        &self.ordering
    }

    /// Output columns differ from the raw input columns.
    pub fn need_materialize_tuple(&self) -> bool {
        self.projection.is_some()
    }

    /// Check every expression against `input` and return the output schema.
    pub fn output_schema(&self, input: &Schema) -> Result<Schema, OpError> {
        let output = match &self.projection {
            Some(exprs) => {
                let mut fields = Vec::with_capacity(exprs.len());
                for e in exprs {
                    fields.push(Field::new(e.output_name(), e.data_type(input)?, true));
                }
                Schema::new(fields)
            }
            None => input.clone(),
        };
        for item in &self.ordering {
            item.expr.data_type(&output)?;
        }
        Ok(output)
    }

    /// Rewrite `block` in place for sorting.
    ///
    /// Any evaluation failure is fatal for the whole operator.
    pub fn materialize(&self, block: &mut Block) -> Result<SortDescription, OpError> {
        if let Some(exprs) = &self.projection {
            let mut ids = Vec::with_capacity(exprs.len());
            for e in exprs {
                ids.push(e.execute(block)?);
            }
            let projected = ids
                .iter()
                .zip(exprs)
                .map(|(&id, e)| Column::new(e.output_name(), block.columns[id].values.clone()))
                .collect();
            *block = Block::try_new(projected)
                .map_err(|e| OpError::ExpressionEvaluation(e.to_string()))?;
        }

        let mut keys = Vec::with_capacity(self.ordering.len());
        for item in &self.ordering {
            let column_number = item.expr.execute(block)?;
            keys.push(SortColumnDescription::new(
                column_number,
                item.asc,
                item.nulls_first,
            ));
        }

        Ok(SortDescription::new(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use vsort_core::prelude::{DataType, Scalar};

    fn block() -> Block {
        Block::try_new(vec![
            Column::new("a", vec![Scalar::I64(1), Scalar::I64(2)]),
            Column::new("b", vec![Scalar::I64(5), Scalar::I64(3)]),
        ])
        .unwrap()
    }

    #[test]
    fn plain_keys_point_at_existing_columns() {
        let exprs = SortExecExprs::new(vec![OrderByExpr::desc(Expr::col("b"))], None);
        let mut b = block();
        let desc = exprs.materialize(&mut b).unwrap();
        assert_eq!(desc[0], SortColumnDescription::new(1, false, false));
        assert_eq!(b.num_columns(), 2);
    }

    #[test]
    fn derived_keys_are_appended_after_output() {
        let key = Expr::binary(BinaryOp::Add, Expr::col("a"), Expr::col("b"));
        let exprs = SortExecExprs::new(vec![OrderByExpr::asc(key)], None);
        let mut b = block();
        let desc = exprs.materialize(&mut b).unwrap();
        assert_eq!(b.num_columns(), 3);
        assert_eq!(desc[0].column_number, 2);
        assert_eq!(b.columns[2].values, vec![Scalar::I64(6), Scalar::I64(5)]);
    }

    #[test]
    fn projection_rewrites_block_before_keys() {
        let exprs = SortExecExprs::new(
            vec![OrderByExpr::asc(Expr::col("b"))],
            Some(vec![
                Expr::col("b"),
                Expr::binary(BinaryOp::Mul, Expr::col("a"), Expr::lit(Scalar::I64(2))),
            ]),
        );
        assert!(exprs.need_materialize_tuple());
        let mut b = block();
        let desc = exprs.materialize(&mut b).unwrap();
        assert_eq!(b.num_columns(), 2);
        assert_eq!(b.columns[0].name, "b");
        assert_eq!(b.columns[1].name, "(a * 2)");
        assert_eq!(desc[0].column_number, 0);
    }

    #[test]
    fn output_schema_validates_keys_against_projection() {
        let input = Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Int64, false),
        ]);
        let ok = SortExecExprs::new(
            vec![OrderByExpr::asc(Expr::col("b"))],
            Some(vec![Expr::col("b")]),
        );
        assert_eq!(ok.output_schema(&input).unwrap().len(), 1);

        let bad = SortExecExprs::new(
            vec![OrderByExpr::asc(Expr::col("a"))],
            Some(vec![Expr::col("b")]),
        );
        assert!(bad.output_schema(&input).is_err());
    }

    #[test]
    fn evaluation_failure_is_fatal() {
        let exprs = SortExecExprs::new(vec![OrderByExpr::asc(Expr::col("zzz"))], None);
        let mut b = block();
        assert!(matches!(
            exprs.materialize(&mut b),
            Err(OpError::ExpressionEvaluation(_))
        ));
    }
}
