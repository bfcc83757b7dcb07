//! The objective cut: forces the relaxation up to the proven objective bound.

use crate::accumulator::CutData;
use crate::accumulator::CutTermData;
use crate::accumulator::RowAccumulator;
use crate::basic_types::Random;
use crate::cuts::candidate::CutCandidate;
use crate::cuts::rounding;
use crate::cuts::submit_candidate;
use crate::cuts::CutContext;
use crate::propagation::ConstraintManager;
use crate::propagation::CutDiagnostics;
use crate::propagation::DerivedRow;
use crate::rows::POSITIVE_INFINITY;

/// Fires when the LP objective lags the best proven integer lower bound by
/// more than one unit: the relaxation then provably misses the inequality
/// `sum obj_coeff * var >= bound`, which is added verbatim when its norm is
/// moderate and otherwise handed to the rounding pipeline.
pub(crate) fn generate(
    context: &CutContext,
    random: &mut dyn Random,
    accumulator: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
) -> usize {
    let Some(bound) = context.best_objective_lower else {
        return 0;
    };
    if context.lp_objective >= (bound - 1) as f64 {
        return 0;
    }
    let violation = bound as f64 - context.lp_objective;

    let norm = context
        .objective_terms
        .iter()
        .map(|&(_, coefficient)| coefficient.abs())
        .max()
        .unwrap_or(0)
        .max(bound.abs());
    if norm == 0 {
        return 0;
    }

    if norm <= context.options.objective_norm_limit {
        let terms = context
            .objective_terms
            .iter()
            .map(|&(column, coefficient)| {
                (context.column_to_variable[column.0 as usize], coefficient)
            })
            .collect();
        let row = DerivedRow {
            terms,
            lower_bound: bound,
            upper_bound: POSITIVE_INFINITY,
        };
        return usize::from(manager.add_cut(row, "objective", CutDiagnostics { violation }));
    }

    // Coefficients too large to add verbatim: negate into `<=` form and let
    // integer rounding shrink them.
    let terms: Vec<CutTermData> = context
        .objective_terms
        .iter()
        .map(|&(column, coefficient)| {
            let index = column.0 as usize;
            let (level_zero_lower, level_zero_upper) = context.bounds[index];
            CutTermData {
                variable: context.column_to_variable[index],
                coefficient: -coefficient,
                lp_value: context.lp_values[index],
                level_zero_lower,
                level_zero_upper,
            }
        })
        .collect();
    let Some(negated_bound) = bound.checked_neg() else {
        return 0;
    };
    let Some(candidate) = CutCandidate::from_cut_data(&CutData {
        terms,
        upper_bound: negated_bound,
    }) else {
        return 0;
    };
    let Some((rounded, _)) =
        rounding::round_candidate(&candidate, random, context.options.violation_tolerance)
    else {
        return 0;
    };
    usize::from(submit_candidate(
        rounded,
        "objective_rounding",
        context,
        accumulator,
        manager,
    ))
}
