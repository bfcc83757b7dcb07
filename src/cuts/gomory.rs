//! Gomory-style cuts from the basis rows of fractional variables.
//!
//! For each basic variable with a fractional LP value the solver exposes the
//! multipliers expressing it over the constraint rows. Those multipliers are
//! scaled into exact integers, combined through the accumulator together with
//! the upper slacks of the participating rows, and handed to the same
//! rounding pipeline as the aggregated cuts.

use crate::accumulator::RowAccumulator;
use crate::basic_types::Random;
use crate::cuts::candidate::CutCandidate;
use crate::cuts::rounding;
use crate::cuts::submit_candidate;
use crate::cuts::CutContext;
use crate::math::checked_ops;
use crate::propagation::ConstraintManager;
use crate::reasoner::ExactReasoner;
use crate::rows::ColumnIndex;
use crate::rows::RowId;
use crate::rows::NEGATIVE_INFINITY;
use crate::rows::POSITIVE_INFINITY;
use crate::termination::TerminationCondition;

#[allow(clippy::too_many_arguments)]
pub(crate) fn generate(
    context: &CutContext,
    tableau: &[(ColumnIndex, Vec<(RowId, f64)>)],
    aggregation: &mut RowAccumulator,
    extraction: &mut RowAccumulator,
    random: &mut dyn Random,
    manager: &mut dyn ConstraintManager,
    termination: &mut dyn TerminationCondition,
) -> usize {
    let mut accepted = 0;
    for (column, multipliers) in tableau {
        if termination.should_stop() {
            break;
        }
        if !is_fractional(context, *column) {
            continue;
        }
        accepted += cut_from_basis_row(
            context,
            multipliers,
            aggregation,
            extraction,
            random,
            manager,
        );
    }
    accepted
}

fn is_fractional(context: &CutContext, column: ColumnIndex) -> bool {
    let value = context.lp_values[column.0 as usize];
    let fraction = value - value.floor();
    let tolerance = context.options.violation_tolerance;
    fraction > tolerance && fraction < 1.0 - tolerance
}

fn cut_from_basis_row(
    context: &CutContext,
    multipliers: &[(RowId, f64)],
    aggregation: &mut RowAccumulator,
    extraction: &mut RowAccumulator,
    random: &mut dyn Random,
    manager: &mut dyn ConstraintManager,
) -> usize {
    let Some(scaled) =
        ExactReasoner::scale_dual_multipliers(context.store, multipliers, 0)
    else {
        return 0;
    };

    aggregation.clear_and_resize(context.width());
    let mut bound = 0_i64;
    for &(row, multiplier) in &scaled.multipliers {
        let side = if multiplier > 0 {
            context.store.upper_bound(row)
        } else {
            context.store.lower_bound(row)
        };
        if side == NEGATIVE_INFINITY || side == POSITIVE_INFINITY {
            return 0;
        }
        let (columns, coefficients) = context.store.terms(row);
        if !aggregation.add_scaled_row(multiplier, columns, coefficients) {
            return 0;
        }
        bound = match checked_ops::checked_mul_add(multiplier, side, bound) {
            Some(value) => value,
            None => return 0,
        };
    }

    let Some(data) = aggregation.to_cut_data(
        context.column_to_variable,
        bound,
        context.lp_values,
        context.bounds,
    ) else {
        return 0;
    };
    let Some(mut candidate) = CutCandidate::from_cut_data(&data) else {
        return 0;
    };

    // Re-introduce the upper slacks of rows entering with a positive
    // multiplier: the combination then holds with equality, which gives the
    // rounding more structure to exploit.
    for &(row, multiplier) in &scaled.multipliers {
        if multiplier <= 0 || context.store.upper_is_trivial(row) {
            continue;
        }
        let upper = context.store.upper_bound(row);
        let min_activity = context
            .store
            .min_activity(row, |column| context.bounds[column.0 as usize]);
        let Some(range) = upper.checked_sub(min_activity) else {
            continue;
        };
        if range <= 0 {
            continue;
        }
        let slack = (upper as f64 - context.activities[row.0 as usize]).max(0.0);
        candidate.push_upper_slack(row, multiplier, slack, range);
    }

    let Some((rounded, _)) =
        rounding::round_candidate(&candidate, random, context.options.violation_tolerance)
    else {
        return 0;
    };
    usize::from(submit_candidate(rounded, "gomory", context, extraction, manager))
}
