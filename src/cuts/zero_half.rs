//! Zero-half cuts: modulo-2 combinations of tight rows.
//!
//! A `<=` combination whose coefficients share an even divisor while its
//! bound is odd gains strength from integer rounding: the extraction's gcd
//! normalisation performs exactly that division with a floored bound. This
//! generator searches single rows and pairs of tight rows for combinations
//! where the normalised result cuts off the current LP solution. Unlike the
//! other generators it consults only values and bounds, no dual information.

use crate::accumulator::RowAccumulator;
use crate::cuts::tight_rows;
use crate::cuts::CutContext;
use crate::math::checked_ops;
use crate::propagation::ConstraintManager;
use crate::propagation::CutDiagnostics;
use crate::propagation::DerivedRow;
use crate::rows::RowId;
use crate::rows::NEGATIVE_INFINITY;
use crate::termination::TerminationCondition;

/// Combinatorial budget: the pair search is quadratic in this.
const MAX_COMBINED_ROWS: usize = 16;

pub(crate) fn generate(
    context: &CutContext,
    aggregation: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
    termination: &mut dyn TerminationCondition,
) -> usize {
    let mut tight = tight_rows(context);
    tight.truncate(MAX_COMBINED_ROWS);

    let mut accepted = 0;
    for first in 0..tight.len() {
        if termination.should_stop() {
            break;
        }
        accepted += try_combination(context, aggregation, &tight[first..=first], manager);
        for second in first + 1..tight.len() {
            let pair = [tight[first], tight[second]];
            accepted += try_combination(context, aggregation, &pair, manager);
        }
    }
    accepted
}

fn try_combination(
    context: &CutContext,
    aggregation: &mut RowAccumulator,
    rows: &[(RowId, i64)],
    manager: &mut dyn ConstraintManager,
) -> usize {
    aggregation.clear_and_resize(context.width());
    let mut bound = 0_i64;
    for &(row, sign) in rows {
        let (columns, coefficients) = context.store.terms(row);
        if !aggregation.add_scaled_row(sign, columns, coefficients) {
            return 0;
        }
        let side = if sign > 0 {
            context.store.upper_bound(row)
        } else {
            context.store.lower_bound(row)
        };
        bound = match checked_ops::checked_mul_add(sign, side, bound) {
            Some(value) => value,
            None => return 0,
        };
    }

    let Some(constraint) =
        aggregation.to_linear_constraint(context.column_to_variable, bound, None)
    else {
        return 0;
    };

    // Only combinations that gained from the floored gcd division can be
    // violated here; plain row sums are satisfied by the LP solution.
    let activity: f64 = constraint
        .terms
        .iter()
        .map(|&(variable, coefficient)| {
            coefficient as f64 * context.lp_values[context.column_of(variable).0 as usize]
        })
        .sum();
    let violation = activity - constraint.upper_bound as f64;
    if violation < context.options.violation_tolerance {
        return 0;
    }

    let row = DerivedRow {
        terms: constraint.terms,
        lower_bound: NEGATIVE_INFINITY,
        upper_bound: constraint.upper_bound,
    };
    usize::from(manager.add_cut(row, "zero_half", CutDiagnostics { violation }))
}
