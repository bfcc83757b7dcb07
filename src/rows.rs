//! The store of linear constraints in exact-integer form.
//!
//! Coefficients and column indices of all rows live in two shared append-only
//! buffers; each row is a `(start, length)` view into them plus bounds and a
//! cached infinity norm. Rows are immutable once added except for bound
//! tightening.

use thiserror::Error;

use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::linrelax_assert_simple;
use crate::math::checked_ops;

/// Column index local to the propagator; assigned once, sorted, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnIndex(pub u32);

impl StorageKey for ColumnIndex {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        ColumnIndex(index as u32)
    }
}

/// Identifier of a row in the [`RowStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowId(pub u32);

impl StorageKey for RowId {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        RowId(index as u32)
    }
}

/// Sentinel for an absent lower row bound.
pub const NEGATIVE_INFINITY: i64 = i64::MIN;
/// Sentinel for an absent upper row bound.
pub const POSITIVE_INFINITY: i64 = i64::MAX;

#[derive(Clone, Copy, Debug)]
struct RowData {
    start: u32,
    length: u32,
    lower_bound: i64,
    upper_bound: i64,
    /// Max absolute value among the bounds and coefficients of the row.
    infinity_norm: i64,
    /// The lower slack side can never bind given the level-zero bounds.
    lower_is_trivial: bool,
    /// The upper slack side can never bind given the level-zero bounds.
    upper_is_trivial: bool,
}

/// Errors detected at the point of row construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowAdditionError {
    /// An empty row whose bounds exclude zero is an immediate conflict.
    #[error("empty row with infeasible bounds [{lower}, {upper}]")]
    EmptyInfeasible { lower: i64, upper: i64 },
    #[error("row bounds are inverted: [{lower}, {upper}]")]
    InvertedBounds { lower: i64, upper: i64 },
    #[error("row has a zero coefficient")]
    ZeroCoefficient,
}

/// The current set of linear constraints `lb <= sum coeff * var <= ub`.
#[derive(Clone, Debug, Default)]
pub struct RowStore {
    columns: Vec<ColumnIndex>,
    coefficients: Vec<i64>,
    rows: KeyedVec<RowId, RowData>,
}

impl RowStore {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> {
        self.rows.keys()
    }

    /// Adds a row over the given terms. The `level_zero_bounds` closure
    /// provides the root bounds per column, used to precompute the
    /// trivial-slack flags.
    ///
    /// Malformed trivial constraints are rejected here rather than deferred.
    pub fn add_row(
        &mut self,
        terms: &[(ColumnIndex, i64)],
        lower_bound: i64,
        upper_bound: i64,
        level_zero_bounds: impl Fn(ColumnIndex) -> (i64, i64),
    ) -> Result<RowId, RowAdditionError> {
        if lower_bound > upper_bound {
            return Err(RowAdditionError::InvertedBounds {
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        if terms.is_empty() && (lower_bound > 0 || upper_bound < 0) {
            return Err(RowAdditionError::EmptyInfeasible {
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        if terms.iter().any(|&(_, coefficient)| coefficient == 0) {
            return Err(RowAdditionError::ZeroCoefficient);
        }

        let start = self.columns.len() as u32;
        let mut infinity_norm = finite_magnitude(lower_bound).max(finite_magnitude(upper_bound));
        for &(column, coefficient) in terms {
            self.columns.push(column);
            self.coefficients.push(coefficient);
            infinity_norm = infinity_norm.max(coefficient.abs());
        }

        let (min_activity, max_activity) = activity_range(terms, &level_zero_bounds);
        let row = RowData {
            start,
            length: terms.len() as u32,
            lower_bound,
            upper_bound,
            infinity_norm,
            lower_is_trivial: lower_bound == NEGATIVE_INFINITY || min_activity >= lower_bound,
            upper_is_trivial: upper_bound == POSITIVE_INFINITY || max_activity <= upper_bound,
        };
        Ok(self.rows.push(row))
    }

    pub fn terms(&self, row: RowId) -> (&[ColumnIndex], &[i64]) {
        let data = &self.rows[row];
        let range = data.start as usize..(data.start + data.length) as usize;
        (&self.columns[range.clone()], &self.coefficients[range])
    }

    pub fn lower_bound(&self, row: RowId) -> i64 {
        self.rows[row].lower_bound
    }

    pub fn upper_bound(&self, row: RowId) -> i64 {
        self.rows[row].upper_bound
    }

    pub fn infinity_norm(&self, row: RowId) -> i64 {
        self.rows[row].infinity_norm
    }

    pub fn lower_is_trivial(&self, row: RowId) -> bool {
        self.rows[row].lower_is_trivial
    }

    pub fn upper_is_trivial(&self, row: RowId) -> bool {
        self.rows[row].upper_is_trivial
    }

    /// Tightens the bounds of a row. Bounds may never loosen.
    pub fn tighten_bounds(&mut self, row: RowId, lower_bound: i64, upper_bound: i64) {
        let data = &mut self.rows[row];
        linrelax_assert_simple!(
            lower_bound >= data.lower_bound && upper_bound <= data.upper_bound,
            "row bounds may only tighten"
        );
        data.lower_bound = lower_bound;
        data.upper_bound = upper_bound;
        data.infinity_norm = data
            .infinity_norm
            .max(finite_magnitude(lower_bound))
            .max(finite_magnitude(upper_bound));
    }

    /// The smallest value the row activity can take under the given bounds.
    ///
    /// Saturates instead of overflowing; the saturation direction keeps the
    /// result a valid lower bound on the activity.
    pub fn min_activity(&self, row: RowId, bounds: impl Fn(ColumnIndex) -> (i64, i64)) -> i64 {
        let (columns, coefficients) = self.terms(row);
        let mut activity: i64 = 0;
        for (&column, &coefficient) in columns.iter().zip(coefficients) {
            let (lower, upper) = bounds(column);
            let bound = if coefficient > 0 { lower } else { upper };
            activity = match checked_ops::checked_mul_add(coefficient, bound, activity) {
                Some(value) => value,
                None => {
                    if (coefficient > 0) == (bound > 0) {
                        checked_ops::MAX_SAFE_MAGNITUDE
                    } else {
                        -checked_ops::MAX_SAFE_MAGNITUDE
                    }
                }
            };
        }
        activity
    }

    /// The largest value the row activity can take under the given bounds.
    pub fn max_activity(&self, row: RowId, bounds: impl Fn(ColumnIndex) -> (i64, i64)) -> i64 {
        let (columns, coefficients) = self.terms(row);
        let mut activity: i64 = 0;
        for (&column, &coefficient) in columns.iter().zip(coefficients) {
            let (lower, upper) = bounds(column);
            let bound = if coefficient > 0 { upper } else { lower };
            activity = match checked_ops::checked_mul_add(coefficient, bound, activity) {
                Some(value) => value,
                None => {
                    if (coefficient > 0) == (bound > 0) {
                        checked_ops::MAX_SAFE_MAGNITUDE
                    } else {
                        -checked_ops::MAX_SAFE_MAGNITUDE
                    }
                }
            };
        }
        activity
    }

    /// Removes all rows beyond the first `row_count`, together with their
    /// share of the coefficient buffers. Used for bulk backtracking of
    /// row-store growth.
    pub(crate) fn truncate(&mut self, row_count: usize) {
        linrelax_assert_simple!(row_count <= self.rows.len());
        if row_count == self.rows.len() {
            return;
        }
        let first_removed = RowId::create_from_index(row_count);
        let buffer_len = self.rows[first_removed].start as usize;
        self.rows.truncate(row_count);
        self.columns.truncate(buffer_len);
        self.coefficients.truncate(buffer_len);
    }
}

fn finite_magnitude(bound: i64) -> i64 {
    if bound == NEGATIVE_INFINITY || bound == POSITIVE_INFINITY {
        0
    } else {
        bound.abs()
    }
}

fn activity_range(
    terms: &[(ColumnIndex, i64)],
    bounds: &impl Fn(ColumnIndex) -> (i64, i64),
) -> (i64, i64) {
    let mut min_activity: i64 = 0;
    let mut max_activity: i64 = 0;
    for &(column, coefficient) in terms {
        let (lower, upper) = bounds(column);
        let (low_side, high_side) = if coefficient > 0 {
            (lower, upper)
        } else {
            (upper, lower)
        };
        min_activity = checked_ops::checked_mul_add(coefficient, low_side, min_activity)
            .unwrap_or(-checked_ops::MAX_SAFE_MAGNITUDE);
        max_activity = checked_ops::checked_mul_add(coefficient, high_side, max_activity)
            .unwrap_or(checked_ops::MAX_SAFE_MAGNITUDE);
    }
    (min_activity, max_activity)
}
