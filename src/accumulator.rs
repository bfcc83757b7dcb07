//! The exact row accumulator.
//!
//! An adaptive sparse/dense vector over columns used to build integer-scaled
//! linear combinations of rows. While few columns are touched only those are
//! tracked; once the touched count crosses a fixed fraction of the width the
//! representation switches to dense and stays dense until the next
//! [`RowAccumulator::clear_and_resize`]. Every addition is overflow-checked;
//! a `false` return means the combination must be abandoned, and no
//! extraction may follow a failed accumulation.

use num::integer::gcd;

use crate::linrelax_assert_moderate;
use crate::math::checked_ops;
use crate::math::num_ext::NumExt;
use crate::propagation::VariableId;
use crate::rows::ColumnIndex;

/// Sparse mode is kept while `touched * DENSITY_DENOMINATOR < width`.
const DENSITY_DENOMINATOR: usize = 10;

#[derive(Clone, Debug, Default)]
pub struct RowAccumulator {
    dense: Vec<i64>,
    /// Columns which may hold a nonzero value; only maintained in sparse mode.
    touched: Vec<usize>,
    /// Parallel seen-bitset over columns; only maintained in sparse mode.
    seen: Vec<bool>,
    is_sparse: bool,
}

/// A derived integer inequality `sum coeff * var <= upper_bound`, normalised
/// by the gcd of its coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraintData {
    pub terms: Vec<(VariableId, i64)>,
    pub upper_bound: i64,
}

/// One term of a [`CutData`]: the extracted coefficient together with the
/// LP value and level-zero bounds of its variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutTermData {
    pub variable: VariableId,
    pub coefficient: i64,
    pub lp_value: f64,
    pub level_zero_lower: i64,
    pub level_zero_upper: i64,
}

/// Extraction mode consumed by the cut heuristics.
#[derive(Clone, Debug, PartialEq)]
pub struct CutData {
    pub terms: Vec<CutTermData>,
    pub upper_bound: i64,
}

impl RowAccumulator {
    /// Resets to an all-zero vector of the given width, back in sparse mode.
    ///
    /// The dense buffer is kept allocated across calls; the accumulator is
    /// reused, never reallocated per use.
    pub fn clear_and_resize(&mut self, width: usize) {
        self.dense.clear();
        self.dense.resize(width, 0);
        self.seen.clear();
        self.seen.resize(width, false);
        self.touched.clear();
        self.is_sparse = true;
    }

    pub fn width(&self) -> usize {
        self.dense.len()
    }

    /// The current value of a column.
    pub fn value(&self, column: ColumnIndex) -> i64 {
        self.dense[column.0 as usize]
    }

    /// Adds `value` to the column. Returns `false` when the running sum would
    /// leave the representable range, in which case the caller must discard
    /// this combination.
    pub fn add(&mut self, column: ColumnIndex, value: i64) -> bool {
        let index = column.0 as usize;
        let Some(sum) = checked_ops::checked_add(self.dense[index], value) else {
            return false;
        };
        if self.is_sparse && !self.seen[index] {
            self.seen[index] = true;
            self.touched.push(index);
            if self.touched.len() * DENSITY_DENOMINATOR >= self.dense.len() {
                // Irreversible until the next clear_and_resize.
                self.is_sparse = false;
            }
        }
        self.dense[index] = sum;
        true
    }

    /// Adds `multiplier` times the given row. Both the per-term product and
    /// the running sums are overflow-checked.
    pub fn add_scaled_row(
        &mut self,
        multiplier: i64,
        columns: &[ColumnIndex],
        coefficients: &[i64],
    ) -> bool {
        linrelax_assert_moderate!(columns.len() == coefficients.len());
        for (&column, &coefficient) in columns.iter().zip(coefficients) {
            let Some(product) = checked_ops::checked_mul(multiplier, coefficient) else {
                return false;
            };
            if !self.add(column, product) {
                return false;
            }
        }
        true
    }

    /// The nonzero entries sorted by column, identical regardless of the
    /// current representation mode.
    pub(crate) fn nonzero_entries(&self) -> Vec<(usize, i64)> {
        // The seen bitset guarantees each column appears in `touched` once.
        if self.is_sparse {
            let mut touched = self.touched.clone();
            touched.sort_unstable();
            touched
                .into_iter()
                .filter(|&index| self.dense[index] != 0)
                .map(|index| (index, self.dense[index]))
                .collect()
        } else {
            self.dense
                .iter()
                .enumerate()
                .filter(|&(_, &value)| value != 0)
                .map(|(index, &value)| (index, value))
                .collect()
        }
    }

    /// Extracts the accumulated combination as `sum coeff * var <= upper_bound`,
    /// mapping columns back to variables, optionally appending one extra term,
    /// and dividing through by the gcd of all coefficients.
    ///
    /// Returns [`None`] when there is no term at all.
    pub fn to_linear_constraint(
        &self,
        column_to_variable: &[VariableId],
        upper_bound: i64,
        extra_term: Option<(VariableId, i64)>,
    ) -> Option<LinearConstraintData> {
        let mut terms: Vec<(VariableId, i64)> = self
            .nonzero_entries()
            .into_iter()
            .map(|(index, coefficient)| (column_to_variable[index], coefficient))
            .collect();
        if let Some((variable, coefficient)) = extra_term {
            if coefficient != 0 {
                terms.push((variable, coefficient));
            }
        }
        if terms.is_empty() {
            return None;
        }

        let divisor = terms
            .iter()
            .fold(0_i64, |divisor, &(_, coefficient)| gcd(divisor, coefficient.abs()));
        linrelax_assert_moderate!(divisor > 0);
        if divisor > 1 {
            for (_, coefficient) in terms.iter_mut() {
                *coefficient /= divisor;
            }
        }

        Some(LinearConstraintData {
            terms,
            upper_bound: upper_bound.div_floor(divisor),
        })
    }

    /// Like [`RowAccumulator::to_linear_constraint`], but additionally
    /// attaches the current LP value and the level-zero bounds per term, for
    /// consumption by the cut heuristics.
    pub fn to_cut_data(
        &self,
        column_to_variable: &[VariableId],
        upper_bound: i64,
        lp_values: &[f64],
        level_zero_bounds: &[(i64, i64)],
    ) -> Option<CutData> {
        let entries = self.nonzero_entries();
        if entries.is_empty() {
            return None;
        }

        let divisor = entries
            .iter()
            .fold(0_i64, |divisor, &(_, coefficient)| gcd(divisor, coefficient.abs()));
        linrelax_assert_moderate!(divisor > 0);

        let terms = entries
            .into_iter()
            .map(|(index, coefficient)| {
                let (level_zero_lower, level_zero_upper) = level_zero_bounds[index];
                CutTermData {
                    variable: column_to_variable[index],
                    coefficient: coefficient / divisor,
                    lp_value: lp_values[index],
                    level_zero_lower,
                    level_zero_upper,
                }
            })
            .collect();
        Some(CutData {
            terms,
            upper_bound: upper_bound.div_floor(divisor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables(width: usize) -> Vec<VariableId> {
        (0..width).map(|index| VariableId(index as u32)).collect()
    }

    fn accumulate_seed_example(width: usize) -> RowAccumulator {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(width);
        assert!(accumulator.add_scaled_row(4, &[ColumnIndex(2)], &[3]));
        assert!(accumulator.add_scaled_row(3, &[ColumnIndex(1)], &[3]));
        assert!(accumulator.add_scaled_row(5, &[ColumnIndex(2)], &[3]));
        accumulator
    }

    #[test]
    fn extraction_is_identical_in_sparse_and_dense_mode() {
        // Width 10 crosses the density threshold, width 100000 stays sparse.
        for width in [10, 100_000] {
            let accumulator = accumulate_seed_example(width);
            let constraint = accumulator
                .to_linear_constraint(&variables(width), 100, None)
                .unwrap();
            // gcd(9, 27) = 9 normalises the combination.
            assert_eq!(
                constraint.terms,
                vec![(VariableId(1), 1), (VariableId(2), 3)],
                "width {width}"
            );
            assert_eq!(constraint.upper_bound, 11);
        }
    }

    #[test]
    fn seed_example_accumulates_expected_values() {
        let accumulator = accumulate_seed_example(10);
        assert_eq!(accumulator.value(ColumnIndex(1)), 9);
        assert_eq!(accumulator.value(ColumnIndex(2)), 27);
    }

    #[test]
    fn overflow_is_reported_and_never_wraps() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(4);
        assert!(accumulator.add(ColumnIndex(0), crate::math::checked_ops::MAX_SAFE_MAGNITUDE));
        // The second addition would exceed the safe range.
        assert!(!accumulator.add(ColumnIndex(0), crate::math::checked_ops::MAX_SAFE_MAGNITUDE));
        // The stored value is untouched by the failed addition.
        assert_eq!(
            accumulator.value(ColumnIndex(0)),
            crate::math::checked_ops::MAX_SAFE_MAGNITUDE
        );
    }

    #[test]
    fn scaled_row_overflow_aborts_midway_without_wrapping() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(4);
        assert!(!accumulator.add_scaled_row(
            i64::MAX / 2,
            &[ColumnIndex(0), ColumnIndex(1)],
            &[1, 4],
        ));
    }

    #[test]
    fn cancelled_columns_are_not_extracted() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(100);
        assert!(accumulator.add(ColumnIndex(5), 7));
        assert!(accumulator.add(ColumnIndex(5), -7));
        assert!(accumulator.add(ColumnIndex(3), 2));
        let constraint = accumulator
            .to_linear_constraint(&variables(100), 4, None)
            .unwrap();
        assert_eq!(constraint.terms, vec![(VariableId(3), 1)]);
        assert_eq!(constraint.upper_bound, 2);
    }

    #[test]
    fn extra_term_participates_in_normalisation() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(10);
        assert!(accumulator.add(ColumnIndex(0), 6));
        let constraint = accumulator
            .to_linear_constraint(&variables(10), 9, Some((VariableId(9), 3)))
            .unwrap();
        assert_eq!(
            constraint.terms,
            vec![(VariableId(0), 2), (VariableId(9), 1)]
        );
        assert_eq!(constraint.upper_bound, 3);
    }

    #[test]
    fn negative_bound_rounds_toward_minus_infinity() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(2);
        assert!(accumulator.add(ColumnIndex(0), 2));
        let constraint = accumulator
            .to_linear_constraint(&variables(2), -3, None)
            .unwrap();
        assert_eq!(constraint.terms, vec![(VariableId(0), 1)]);
        assert_eq!(constraint.upper_bound, -2);
    }

    #[test]
    fn cut_data_attaches_lp_values_and_level_zero_bounds() {
        let mut accumulator = RowAccumulator::default();
        accumulator.clear_and_resize(3);
        assert!(accumulator.add(ColumnIndex(0), 4));
        assert!(accumulator.add(ColumnIndex(2), 6));
        let lp_values = [0.5, 0.0, 1.25];
        let bounds = [(0, 1), (0, 1), (0, 5)];
        let cut = accumulator
            .to_cut_data(&variables(3), 7, &lp_values, &bounds)
            .unwrap();
        assert_eq!(cut.upper_bound, 3);
        assert_eq!(cut.terms.len(), 2);
        assert_eq!(cut.terms[0].coefficient, 2);
        assert_eq!(cut.terms[0].lp_value, 0.5);
        assert_eq!(cut.terms[1].coefficient, 3);
        assert_eq!(cut.terms[1].level_zero_upper, 5);
    }
}
