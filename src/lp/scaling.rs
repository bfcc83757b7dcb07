//! Conversion between the exact integer domain and the floating-point domain
//! of the external solver.
//!
//! Each column carries an exact power-of-two scale factor `s`. The solver
//! works on `y = s * x` with coefficients divided by `s`, which keeps solver
//! coefficient magnitudes moderate while making every conversion exact in
//! binary floating point: `x = y / s`, reduced costs multiply back by `s`,
//! duals and activities are unscaled as-is.

use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::linrelax_assert_simple;
use crate::lp::LpColIndex;
use crate::lp::LpConstraintStatus;
use crate::lp::LpRowIndex;
use crate::lp::LpSolver;
use crate::rows::ColumnIndex;
use crate::rows::NEGATIVE_INFINITY;
use crate::rows::POSITIVE_INFINITY;
use crate::rows::RowId;
use crate::rows::RowStore;

/// Solver coefficients are kept below `2^TARGET_EXPONENT` in magnitude.
const TARGET_EXPONENT: i32 = 20;

#[derive(Debug, Default)]
pub struct ScalingBridge {
    /// Power-of-two scale per column; exact in f64.
    column_scale: Vec<f64>,
    lp_columns: Vec<LpColIndex>,
    lp_rows: KeyedVec<RowId, LpRowIndex>,
}

impl ScalingBridge {
    /// Installs one LP column per propagator column. Called once at
    /// construction; the scale is derived from the largest coefficient
    /// magnitude the column carries (objective included).
    pub fn install_columns(
        &mut self,
        lp: &mut impl LpSolver,
        column_norms: &[i64],
        objective: impl Fn(ColumnIndex) -> i64,
        bounds: impl Fn(ColumnIndex) -> (i64, i64),
    ) {
        linrelax_assert_simple!(self.lp_columns.is_empty());
        for (index, &norm) in column_norms.iter().enumerate() {
            let column = ColumnIndex::create_from_index(index);
            let scale = power_of_two_scale(norm.max(objective(column).abs()));
            let (lower, upper) = bounds(column);
            let lp_column = lp.add_variable(
                lower as f64 * scale,
                upper as f64 * scale,
                objective(column) as f64 / scale,
            );
            self.column_scale.push(scale);
            self.lp_columns.push(lp_column);
        }
    }

    /// Mirrors a stored row into the floating-point model.
    pub fn attach_row(&mut self, lp: &mut impl LpSolver, store: &RowStore, row: RowId) {
        linrelax_assert_simple!(self.lp_rows.len() == row.index());
        let (columns, coefficients) = store.terms(row);
        let terms: Vec<(LpColIndex, f64)> = columns
            .iter()
            .zip(coefficients)
            .map(|(&column, &coefficient)| {
                (
                    self.lp_columns[column.index()],
                    coefficient as f64 / self.column_scale[column.index()],
                )
            })
            .collect();
        let lp_row = lp.add_constraint(
            &terms,
            row_bound_to_f64(store.lower_bound(row), f64::NEG_INFINITY),
            row_bound_to_f64(store.upper_bound(row), f64::INFINITY),
        );
        let _ = self.lp_rows.push(lp_row);
    }

    /// Pushes the current (possibly tightened) variable bounds, scaled
    /// per-column, into the external model.
    pub fn push_bounds(&self, lp: &mut impl LpSolver, bounds: impl Fn(ColumnIndex) -> (i64, i64)) {
        for (index, &lp_column) in self.lp_columns.iter().enumerate() {
            let (lower, upper) = bounds(ColumnIndex::create_from_index(index));
            let scale = self.column_scale[index];
            lp.set_variable_bounds(lp_column, lower as f64 * scale, upper as f64 * scale);
        }
    }

    /// Pushes tightened row bounds into the external model.
    pub fn push_row_bounds(&self, lp: &mut impl LpSolver, store: &RowStore, row: RowId) {
        lp.set_constraint_bounds(
            self.lp_rows[row],
            row_bound_to_f64(store.lower_bound(row), f64::NEG_INFINITY),
            row_bound_to_f64(store.upper_bound(row), f64::INFINITY),
        );
    }

    /// The primal value of a column in the exact problem's units.
    pub fn variable_value(&self, lp: &impl LpSolver, column: ColumnIndex) -> f64 {
        lp.variable_value(self.lp_columns[column.index()]) / self.column_scale[column.index()]
    }

    /// The reduced cost of a column in the exact problem's units.
    pub fn reduced_cost(&self, lp: &impl LpSolver, column: ColumnIndex) -> f64 {
        lp.reduced_cost(self.lp_columns[column.index()]) * self.column_scale[column.index()]
    }

    /// Row duals are unaffected by column scaling.
    pub fn dual_value(&self, lp: &impl LpSolver, row: RowId) -> f64 {
        lp.dual_value(self.lp_rows[row])
    }

    /// Row activities are unaffected by column scaling.
    pub fn constraint_activity(&self, lp: &impl LpSolver, row: RowId) -> f64 {
        lp.constraint_activity(self.lp_rows[row])
    }

    pub fn constraint_status(&self, lp: &impl LpSolver, row: RowId) -> LpConstraintStatus {
        lp.constraint_status(self.lp_rows[row])
    }

    pub fn lp_column(&self, column: ColumnIndex) -> LpColIndex {
        self.lp_columns[column.index()]
    }

    /// Maps an LP row index back to the store's row id.
    pub fn row_of_lp_row(&self, lp_row: LpRowIndex) -> Option<RowId> {
        self.lp_rows
            .keys()
            .find(|&row| self.lp_rows[row] == lp_row)
    }

    pub fn is_basic(&self, lp: &impl LpSolver, column: ColumnIndex) -> bool {
        lp.is_basic(self.lp_columns[column.index()])
    }

    /// Drops the bridge's view of rows beyond `row_count` after the store was
    /// truncated on backtrack. The external model is rebuilt lazily by
    /// re-attaching rows; solvers that cannot delete rows may instead relax
    /// the dropped rows' bounds to infinite.
    pub fn truncate_rows(&mut self, lp: &mut impl LpSolver, row_count: usize) {
        for row in self.lp_rows.keys().skip(row_count) {
            lp.set_constraint_bounds(self.lp_rows[row], f64::NEG_INFINITY, f64::INFINITY);
        }
        self.lp_rows.truncate(row_count);
    }
}

fn row_bound_to_f64(bound: i64, infinity: f64) -> f64 {
    if bound == NEGATIVE_INFINITY || bound == POSITIVE_INFINITY {
        infinity
    } else {
        bound as f64
    }
}

/// The power of two `s` such that `norm / s` lands in `[1, 2^TARGET_EXPONENT)`;
/// 1.0 for already-small norms.
fn power_of_two_scale(norm: i64) -> f64 {
    let mut scale = 1.0_f64;
    let mut scaled = norm.max(1) as f64;
    let target = (1_i64 << TARGET_EXPONENT) as f64;
    while scaled >= target {
        scaled /= 2.0;
        scale *= 2.0;
    }
    scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_norms_are_unscaled() {
        assert_eq!(power_of_two_scale(1), 1.0);
        assert_eq!(power_of_two_scale(27), 1.0);
        assert_eq!(power_of_two_scale((1 << 20) - 1), 1.0);
    }

    #[test]
    fn large_norms_scale_down_by_powers_of_two() {
        let scale = power_of_two_scale(1 << 30);
        assert_eq!(scale, 2048.0);
        // The solver-side coefficient magnitude lands in the target range.
        let scaled = (1_i64 << 30) as f64 / scale;
        assert!((1.0..(1_i64 << 20) as f64).contains(&scaled));
    }

    #[test]
    fn solver_coefficients_land_in_the_target_range() {
        for shift in [0, 10, 19, 20, 21, 30, 45, 62] {
            let norm = 1_i64 << shift;
            let scale = power_of_two_scale(norm);
            assert!(scale >= 1.0, "shift {shift}");
            let scaled = norm as f64 / scale;
            assert!(
                (1.0..(1_i64 << 20) as f64).contains(&scaled),
                "shift {shift}"
            );
        }
    }
}
