//! Scalar expressions evaluated column-wise against a block.
//!
//! Supports column references, literals, negation and the four arithmetic
//! operators. Nulls propagate; integer arithmetic is checked and a failure
//! (overflow, division by zero, non-numeric operand) is an evaluation error.

use std::fmt;

use serde::{Deserialize, Serialize};
use vsort_core::prelude::{Block, Column, DataType, Scalar, Schema};

use crate::traits::OpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(String),
    Literal(Scalar),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn lit(value: Scalar) -> Self {
        Expr::Literal(value)
    }

    pub fn negate(inner: Expr) -> Self {
        Expr::Negate(Box::new(inner))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Name of the column this expression produces.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            other => other.to_string(),
        }
    }

    /// Static result type against `schema`.
    pub fn data_type(&self, schema: &Schema) -> Result<DataType, OpError> {
        match self {
            Expr::Column(name) => {
                let idx = schema
                    .index_of(name)
                    .ok_or_else(|| OpError::Schema(format!("column '{name}' not found")))?;
                Ok(schema.fields[idx].data_type)
            }
            Expr::Literal(v) => Ok(v.data_type().unwrap_or(DataType::Int64)),
            Expr::Negate(inner) => {
                let t = inner.data_type(schema)?;
                if !t.is_numeric() {
                    return Err(OpError::Plan(format!("cannot negate {t:?} in '{self}'")));
                }
                Ok(t)
            }
            Expr::Binary { left, right, .. } => {
                let (l, r) = (left.data_type(schema)?, right.data_type(schema)?);
                if !l.is_numeric() || !r.is_numeric() {
                    return Err(OpError::Plan(format!(
                        "arithmetic on {l:?} and {r:?} in '{self}'"
                    )));
                }
                Ok(if is_float(l) || is_float(r) {
                    DataType::Float64
                } else {
                    DataType::Int64
                })
            }
        }
    }

    /// Evaluate every row of `block`.
    pub fn evaluate(&self, block: &Block) -> Result<Vec<Scalar>, OpError> {
        match self {
            Expr::Column(name) => {
                let idx = lookup(block, name)?;
                Ok(block.columns[idx].values.clone())
            }
            Expr::Literal(v) => Ok(vec![v.clone(); block.num_rows()]),
            Expr::Negate(inner) => inner
                .evaluate(block)?
                .iter()
                .map(negate_scalar)
                .collect(),
            Expr::Binary { op, left, right } => {
                let l = left.evaluate(block)?;
                let r = right.evaluate(block)?;
                l.iter()
                    .zip(r.iter())
                    .map(|(a, b)| apply_binary(*op, a, b))
                    .collect()
            }
        }
    }

    /// Evaluate into `block` and return the index of the result column.
    ///
    /// Column references resolve in place; anything else appends a derived
    /// column named after the expression.
    pub fn execute(&self, block: &mut Block) -> Result<usize, OpError> {
        if let Expr::Column(name) = self {
            return lookup(block, name);
        }
        let values = self.evaluate(block)?;
        block
            .push_column(Column::new(self.output_name(), values))
            .map_err(|e| OpError::ExpressionEvaluation(e.to_string()))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Literal(v) => match v {
                Scalar::Null => write!(f, "NULL"),
                Scalar::Bool(b) => write!(f, "{b}"),
                Scalar::I32(i) => write!(f, "{i}"),
                Scalar::I64(i) => write!(f, "{i}"),
                Scalar::F32(x) => write!(f, "{x}"),
                Scalar::F64(x) => write!(f, "{x}"),
                Scalar::Str(s) => write!(f, "'{s}'"),
                Scalar::Bin(b) => write!(f, "<{} bytes>", b.len()),
            },
            Expr::Negate(inner) => write!(f, "(-{inner})"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

fn lookup(block: &Block, name: &str) -> Result<usize, OpError> {
    block
        .column_index(name)
        .ok_or_else(|| OpError::ExpressionEvaluation(format!("column '{name}' not found")))
}

fn is_float(t: DataType) -> bool {
    matches!(t, DataType::Float32 | DataType::Float64)
}

fn negate_scalar(v: &Scalar) -> Result<Scalar, OpError> {
    use Scalar::*;
    match v {
        Null => Ok(Null),
        I32(i) => i
            .checked_neg()
            .map(I32)
            .ok_or_else(|| overflow("negate", v, &Null)),
        I64(i) => i
            .checked_neg()
            .map(I64)
            .ok_or_else(|| overflow("negate", v, &Null)),
        F32(x) => Ok(F32(-x)),
        F64(x) => Ok(F64(-x)),
        other => Err(OpError::ExpressionEvaluation(format!(
            "cannot negate {:?}",
            other.data_type()
        ))),
    }
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn as_numeric(v: &Scalar) -> Option<Numeric> {
    match v {
        Scalar::I32(i) => Some(Numeric::Int(i64::from(*i))),
        Scalar::I64(i) => Some(Numeric::Int(*i)),
        Scalar::F32(x) => Some(Numeric::Float(f64::from(*x))),
        Scalar::F64(x) => Some(Numeric::Float(*x)),
        _ => None,
    }
}

fn apply_binary(op: BinaryOp, a: &Scalar, b: &Scalar) -> Result<Scalar, OpError> {
    if a.is_null() || b.is_null() {
        return Ok(Scalar::Null);
    }
    let (Some(x), Some(y)) = (as_numeric(a), as_numeric(b)) else {
        return Err(OpError::ExpressionEvaluation(format!(
            "'{}' needs numeric operands, got {:?} and {:?}",
            op.symbol(),
            a.data_type(),
            b.data_type()
        )));
    };
    match (x, y) {
        (Numeric::Int(x), Numeric::Int(y)) => {
            let out = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div => {
                    if y == 0 {
                        return Err(OpError::ExpressionEvaluation("division by zero".into()));
                    }
                    x.checked_div(y)
                }
            };
            out.map(Scalar::I64)
                .ok_or_else(|| overflow(op.symbol(), a, b))
        }
        (x, y) => {
            let x = match x {
                Numeric::Int(i) => i as f64,
                Numeric::Float(f) => f,
            };
            let y = match y {
                Numeric::Int(i) => i as f64,
                Numeric::Float(f) => f,
            };
            Ok(Scalar::F64(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
            }))
        }
    }
}

fn overflow(op: &str, a: &Scalar, b: &Scalar) -> OpError {
    OpError::ExpressionEvaluation(format!("integer overflow in '{op}' on {a:?}, {b:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsort_core::prelude::Field;

    fn block() -> Block {
        Block::try_new(vec![
            Column::new("a", vec![Scalar::I64(1), Scalar::Null, Scalar::I64(3)]),
            Column::new(
                "s",
                vec![
                    Scalar::Str("x".into()),
                    Scalar::Str("y".into()),
                    Scalar::Str("z".into()),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn column_reference_does_not_append() {
        let mut b = block();
        assert_eq!(Expr::col("s").execute(&mut b).unwrap(), 1);
        assert_eq!(b.num_columns(), 2);
    }

    #[test]
    fn derived_column_is_appended_and_nulls_propagate() {
        let mut b = block();
        let e = Expr::binary(BinaryOp::Mul, Expr::col("a"), Expr::lit(Scalar::I32(10)));
        let idx = e.execute(&mut b).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(b.columns[2].name, "(a * 10)");
        assert_eq!(
            b.columns[2].values,
            vec![Scalar::I64(10), Scalar::Null, Scalar::I64(30)]
        );
    }

    #[test]
    fn evaluation_errors_are_reported() {
        let mut b = block();
        let missing = Expr::col("nope").execute(&mut b);
        assert!(matches!(missing, Err(OpError::ExpressionEvaluation(_))));

        let bad = Expr::negate(Expr::col("s")).execute(&mut b);
        assert!(matches!(bad, Err(OpError::ExpressionEvaluation(_))));

        let div = Expr::binary(BinaryOp::Div, Expr::col("a"), Expr::lit(Scalar::I64(0)));
        assert!(matches!(
            div.execute(&mut b),
            Err(OpError::ExpressionEvaluation(_))
        ));
    }

    #[test]
    fn data_type_follows_promotion() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("f", DataType::Float32, true),
            Field::new("s", DataType::Utf8, true),
        ]);
        let e = Expr::binary(BinaryOp::Add, Expr::col("a"), Expr::col("f"));
        assert_eq!(e.data_type(&schema).unwrap(), DataType::Float64);
        assert_eq!(
            Expr::negate(Expr::col("a")).data_type(&schema).unwrap(),
            DataType::Int32
        );
        assert!(Expr::negate(Expr::col("s")).data_type(&schema).is_err());
    }
}
