//! Lightweight value/column/block containers.
//!
//! A `Block` is a batch of rows stored column-wise; every column has the same
//! length and rows are addressed by a shared position. `MutableBlock` is the
//! append-only buffer blocks are accumulated into.

use std::cmp::Ordering;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    /// Logical type of the value, `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Bytes attributed to this value, inline slot plus heap payload.
    pub fn byte_size(&self) -> usize {
        let heap = match self {
            Scalar::Str(s) => s.capacity(),
            Scalar::Bin(b) => b.capacity(),
            _ => 0,
        };
        mem::size_of::<Scalar>() + heap
    }

    /// Total order over non-null values.
    ///
    /// Integers and floats compare by numeric value, exactly, and NaN sorts
    /// after every other number. Other values of different types order by
    /// type tag. Null placement is decided by the caller, `Null` only compares
    /// equal to itself here.
    pub fn compare_values(&self, other: &Scalar) -> Ordering {
        use Scalar::*;

        match (self, other) {
            (Bool(x), Bool(y)) => x.cmp(y),
            (I32(x), I32(y)) => x.cmp(y),
            (I64(x), I64(y)) => x.cmp(y),
            (I32(x), I64(y)) => i64::from(*x).cmp(y),
            (I64(x), I32(y)) => x.cmp(&i64::from(*y)),
            (F32(x), F32(y)) => float_cmp(f64::from(*x), f64::from(*y)),
            (F64(x), F64(y)) => float_cmp(*x, *y),
            (F32(x), F64(y)) => float_cmp(f64::from(*x), *y),
            (F64(x), F32(y)) => float_cmp(*x, f64::from(*y)),
            (I32(x), F32(y)) => int_float_cmp(i64::from(*x), f64::from(*y)),
            (I32(x), F64(y)) => int_float_cmp(i64::from(*x), *y),
            (I64(x), F32(y)) => int_float_cmp(*x, f64::from(*y)),
            (I64(x), F64(y)) => int_float_cmp(*x, *y),
            (F32(x), I32(y)) => int_float_cmp(i64::from(*y), f64::from(*x)).reverse(),
            (F32(x), I64(y)) => int_float_cmp(*y, f64::from(*x)).reverse(),
            (F64(x), I32(y)) => int_float_cmp(i64::from(*y), *x).reverse(),
            (F64(x), I64(y)) => int_float_cmp(*y, *x).reverse(),
            (Str(x), Str(y)) => x.cmp(y),
            (Bin(x), Bin(y)) => x.cmp(y),
            _ => type_order(self).cmp(&type_order(other)),
        }
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer against a float, without rounding the
/// integer through `f64`.
fn int_float_cmp(x: i64, y: f64) -> Ordering {
    // 2^63, the first float past i64::MAX.
    const I64_END: f64 = 9_223_372_036_854_775_808.0;
    if y.is_nan() || y >= I64_END {
        return Ordering::Less;
    }
    if y < -I64_END {
        return Ordering::Greater;
    }
    let whole = y.trunc();
    x.cmp(&(whole as i64)).then_with(|| {
        let frac = y - whole;
        if frac > 0.0 {
            Ordering::Less
        } else if frac < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

/// Assign a numeric order to scalar types for mixed-type comparisons.
fn type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) | I64(_) => 2,
        F32(_) | F64(_) => 3,
        Str(_) => 4,
        Bin(_) => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.values.iter().map(Scalar::byte_size).sum()
    }
}

/// Immutable batch of rows stored column-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub columns: Vec<Column>,
}

impl Block {
    /// Build a block, checking that every column has the same length.
    pub fn try_new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
                return Err(Error::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    rows
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Empty block with one column per schema field.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema.fields.iter().map(|f| Column::empty(&f.name)).collect(),
        }
    }

    /// Empty block with the same column names as `self`.
    pub fn clone_empty(&self) -> Self {
        Self {
            columns: self.columns.iter().map(|c| Column::empty(&c.name)).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.columns.iter().map(Column::byte_size).sum()
    }

    /// Append a column. Its length must match the existing rows.
    pub fn push_column(&mut self, column: Column) -> Result<usize> {
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(Error::Schema(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.num_rows()
            )));
        }
        self.columns.push(column);
        Ok(self.columns.len() - 1)
    }

    /// Reorder rows so that row `i` of the result is row `indices[i]` of `self`.
    ///
    /// `indices` may be shorter than the block, in which case the result only
    /// holds the selected rows.
    pub fn take(&mut self, indices: &[usize]) {
        for col in &mut self.columns {
            let mut original: Vec<Option<Scalar>> =
                mem::take(&mut col.values).into_iter().map(Some).collect();
            col.values = indices
                .iter()
                .map(|&i| original[i].take().unwrap_or(Scalar::Null))
                .collect();
        }
    }

    /// Keep only the first `rows` rows.
    pub fn truncate(&mut self, rows: usize) {
        for col in &mut self.columns {
            col.values.truncate(rows);
        }
    }

    /// Drop the first `rows` rows.
    pub fn skip_rows(&mut self, rows: usize) {
        let rows = rows.min(self.num_rows());
        for col in &mut self.columns {
            col.values.drain(..rows);
        }
    }

    /// Keep only the first `width` columns.
    pub fn truncate_columns(&mut self, width: usize) {
        self.columns.truncate(width);
    }

    /// Split off the first `rows` rows into a new block.
    pub fn split_front(&mut self, rows: usize) -> Block {
        let rows = rows.min(self.num_rows());
        Block {
            columns: self
                .columns
                .iter_mut()
                .map(|c| Column::new(c.name.clone(), c.values.drain(..rows).collect()))
                .collect(),
        }
    }

    /// Row `row` as a vector of owned values (test/debug helper).
    pub fn row(&self, row: usize) -> Vec<Scalar> {
        self.columns.iter().map(|c| c.values[row].clone()).collect()
    }
}

impl AsRef<Block> for Block {
    fn as_ref(&self) -> &Block {
        self
    }
}

/// Append-only accumulation buffer with a fixed column layout.
#[derive(Debug, Clone, Default)]
pub struct MutableBlock {
    columns: Vec<Column>,
    allocated_bytes: usize,
}

impl MutableBlock {
    /// Empty buffer with one column per schema field.
    pub fn new(schema: &Schema) -> Self {
        Self::from_names(schema.fields.iter().map(|f| f.name.clone()))
    }

    /// Empty buffer with the same layout as `block`.
    pub fn empty_like(block: &Block) -> Self {
        Self::from_names(block.columns.iter().map(|c| c.name.clone()))
    }

    fn from_names(names: impl Iterator<Item = String>) -> Self {
        Self {
            columns: names.map(Column::empty).collect(),
            allocated_bytes: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Append all rows of `block`. Column counts must match.
    pub fn merge(&mut self, block: Block) -> Result<()> {
        if block.num_columns() != self.columns.len() {
            return Err(Error::Schema(format!(
                "cannot merge block with {} columns into buffer with {}",
                block.num_columns(),
                self.columns.len()
            )));
        }
        for (dst, src) in self.columns.iter_mut().zip(block.columns) {
            self.allocated_bytes += src.byte_size();
            dst.values.extend(src.values);
        }
        Ok(())
    }

    /// Copy one row of `src` (its first `num_columns()` columns) into the buffer.
    pub fn insert_row_from(&mut self, src: &Block, row: usize) {
        for (dst, col) in self.columns.iter_mut().zip(&src.columns) {
            let value = col.values[row].clone();
            self.allocated_bytes += value.byte_size();
            dst.values.push(value);
        }
    }

    /// Hand out the accumulated rows and leave an empty buffer with the same layout.
    pub fn to_block(&mut self) -> Block {
        let columns = self
            .columns
            .iter_mut()
            .map(|c| Column::new(c.name.clone(), mem::take(&mut c.values)))
            .collect();
        self.allocated_bytes = 0;
        Block { columns }
    }
}
