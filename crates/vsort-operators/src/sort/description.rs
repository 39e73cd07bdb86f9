//! Ordering specification and the row comparator used by every sort stage.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use vsort_core::prelude::{Block, Scalar};

use crate::expr::Expr;

/// One `ORDER BY` item as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
    pub nulls_first: bool,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            asc: true,
            nulls_first: true,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            asc: false,
            nulls_first: false,
        }
    }

    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = nulls_first;
        self
    }
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nulls {}",
            if self.asc { "asc" } else { "desc" },
            if self.nulls_first { "first" } else { "last" }
        )
    }
}

/// Key column position plus its direction tags.
///
/// `direction` is `1` for ascending and `-1` for descending. `nulls_direction`
/// is the sign a null takes when compared against a non-null value before the
/// direction is applied: it equals `direction` for nulls last and `-direction`
/// for nulls first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumnDescription {
    pub column_number: usize,
    pub direction: i8,
    pub nulls_direction: i8,
}

impl SortColumnDescription {
    pub fn new(column_number: usize, asc: bool, nulls_first: bool) -> Self {
        let direction = if asc { 1 } else { -1 };
        Self {
            column_number,
            direction,
            nulls_direction: if nulls_first { -direction } else { direction },
        }
    }

    #[inline]
    fn compare(&self, a: &Scalar, b: &Scalar) -> Ordering {
        let raw = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => sign(self.nulls_direction),
            (false, true) => sign(self.nulls_direction).reverse(),
            (false, false) => a.compare_values(b),
        };
        if self.direction < 0 {
            raw.reverse()
        } else {
            raw
        }
    }
}

#[inline]
fn sign(v: i8) -> Ordering {
    v.cmp(&0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortDescription {
    columns: Vec<SortColumnDescription>,
}

impl SortDescription {
    pub fn new(columns: Vec<SortColumnDescription>) -> Self {
        Self { columns }
    }

    /// Lexicographic comparison of `lhs[l]` against `rhs[r]` over the key columns.
    ///
    /// Both blocks must share the key column layout.
    pub fn compare_rows(&self, lhs: &Block, l: usize, rhs: &Block, r: usize) -> Ordering {
        for key in &self.columns {
            let a = &lhs.columns[key.column_number].values[l];
            let b = &rhs.columns[key.column_number].values[r];
            match key.compare(a, b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl Deref for SortDescription {
    type Target = [SortColumnDescription];

    fn deref(&self) -> &Self::Target {
        &self.columns
    }
}
