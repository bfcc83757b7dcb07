//! Row-combination cuts by aggregation and integer rounding.
//!
//! One pass builds a combination starting from a randomly chosen tight row
//! and greedily folds in further tight rows, each fold aimed at cancelling
//! the column whose LP value sits farthest from its bounds. After the start
//! and after every fold, the aggregate is offered to the rounding pipeline.
//! Row and column choices are weighted random draws so repeated calls can
//! discover different cuts from the same solution.

use crate::accumulator::RowAccumulator;
use crate::basic_types::Random;
use crate::cuts::candidate::CutCandidate;
use crate::cuts::rounding;
use crate::cuts::submit_candidate;
use crate::cuts::tight_rows;
use crate::cuts::CutContext;
use crate::math::checked_ops;
use crate::propagation::ConstraintManager;
use crate::rows::ColumnIndex;
use crate::rows::RowId;
use crate::termination::TerminationCondition;

pub(crate) fn generate(
    context: &CutContext,
    random: &mut dyn Random,
    aggregation: &mut RowAccumulator,
    extraction: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
    termination: &mut dyn TerminationCondition,
) -> usize {
    let tight = tight_rows(context);
    if tight.is_empty() {
        return 0;
    }

    let weights: Vec<f64> = tight
        .iter()
        .map(|&(row, _)| context.duals[row.0 as usize].abs() + 1.0)
        .collect();
    let Some(start) = random.get_weighted_choice(&weights) else {
        return 0;
    };
    let (start_row, start_sign) = tight[start];

    aggregation.clear_and_resize(context.width());
    let (columns, coefficients) = context.store.terms(start_row);
    if !aggregation.add_scaled_row(start_sign, columns, coefficients) {
        return 0;
    }
    let side = bound_side(context, start_row, start_sign);
    let Some(mut bound) = checked_ops::checked_mul(start_sign, side) else {
        return 0;
    };
    let mut used = vec![start_row];

    let mut accepted = try_rounding_cut(context, aggregation, extraction, random, bound, manager);
    for _ in 0..context.options.max_aggregation_rows {
        if termination.should_stop() {
            break;
        }

        let Some(column) = pick_elimination_column(context, aggregation, random) else {
            break;
        };
        let Some((fold_row, fold_sign, multiplier)) =
            pick_fold_row(context, &tight, &used, aggregation, column, random)
        else {
            break;
        };

        let (columns, coefficients) = context.store.terms(fold_row);
        if !aggregation.add_scaled_row(multiplier, columns, coefficients) {
            // A partial fold leaves the aggregate unusable.
            break;
        }
        let side = bound_side(context, fold_row, fold_sign);
        bound = match checked_ops::checked_mul_add(multiplier, side, bound) {
            Some(value) => value,
            None => break,
        };
        used.push(fold_row);
        // Every fold, the deepest included, gets its shot at a cut.
        accepted += try_rounding_cut(context, aggregation, extraction, random, bound, manager);
    }
    accepted
}

fn try_rounding_cut(
    context: &CutContext,
    aggregation: &RowAccumulator,
    extraction: &mut RowAccumulator,
    random: &mut dyn Random,
    bound: i64,
    manager: &mut dyn ConstraintManager,
) -> usize {
    let Some(data) = aggregation.to_cut_data(
        context.column_to_variable,
        bound,
        context.lp_values,
        context.bounds,
    ) else {
        return 0;
    };
    let Some(candidate) = CutCandidate::from_cut_data(&data) else {
        return 0;
    };
    let Some((rounded, _)) =
        rounding::round_candidate(&candidate, random, context.options.violation_tolerance)
    else {
        return 0;
    };
    usize::from(submit_candidate(rounded, "mir", context, extraction, manager))
}

/// The column to cancel next: a weighted draw where the weight is the LP
/// value's distance from its nearest bound.
fn pick_elimination_column(
    context: &CutContext,
    aggregation: &RowAccumulator,
    random: &mut dyn Random,
) -> Option<ColumnIndex> {
    let mut candidates = Vec::new();
    let mut weights = Vec::new();
    for (index, _) in aggregation.nonzero_entries() {
        let (lower, upper) = context.bounds[index];
        let value = context.lp_values[index];
        let distance = (value - lower as f64).min(upper as f64 - value);
        if distance > context.options.violation_tolerance {
            candidates.push(ColumnIndex(index as u32));
            weights.push(distance);
        }
    }
    let chosen = random.get_weighted_choice(&weights)?;
    Some(candidates[chosen])
}

/// A tight, not yet used row containing `column`, with the multiplier that
/// best cancels the accumulated coefficient. The multiplier sign must match
/// the row's tight side.
fn pick_fold_row(
    context: &CutContext,
    tight: &[(RowId, i64)],
    used: &[RowId],
    aggregation: &RowAccumulator,
    column: ColumnIndex,
    random: &mut dyn Random,
) -> Option<(RowId, i64, i64)> {
    let accumulated = aggregation.value(column);
    let mut candidates = Vec::new();
    let mut weights = Vec::new();
    for &(row, sign) in tight {
        if used.contains(&row) {
            continue;
        }
        let (columns, coefficients) = context.store.terms(row);
        let Some(position) = columns.iter().position(|&c| c == column) else {
            continue;
        };
        let row_coefficient = coefficients[position];
        let mut multiplier = -accumulated / row_coefficient;
        if multiplier == 0 {
            multiplier = -(accumulated.signum() * row_coefficient.signum());
        }
        if multiplier.signum() != sign {
            continue;
        }
        candidates.push((row, sign, multiplier));
        weights.push(context.duals[row.0 as usize].abs() + 1.0);
    }
    let chosen = random.get_weighted_choice(&weights)?;
    Some(candidates[chosen])
}

fn bound_side(context: &CutContext, row: RowId, sign: i64) -> i64 {
    if sign > 0 {
        context.store.upper_bound(row)
    } else {
        context.store.lower_bound(row)
    }
}

#[cfg(test)]
mod tests {
    use fnv::FnvHashMap;

    use super::*;
    use crate::basic_types::TestRandom;
    use crate::lp::LpConstraintStatus;
    use crate::options::RelaxationOptions;
    use crate::propagation::SimpleConstraintManager;
    use crate::propagation::VariableId;
    use crate::rows::RowStore;
    use crate::rows::NEGATIVE_INFINITY;
    use crate::termination::Indefinite;

    #[test]
    fn the_aggregate_after_the_final_fold_is_offered_to_rounding() {
        // x + y <= 2 alone has unit coefficients and nothing to round with.
        // Folding in x - y <= 0 gives 2x <= 2, which rounds to the cut
        // x <= 1, violated at the fractional point (1.2, 0.8).
        let mut store = RowStore::default();
        let _ = store
            .add_row(
                &[(ColumnIndex(0), 1), (ColumnIndex(1), 1)],
                NEGATIVE_INFINITY,
                2,
                |_| (0, 10),
            )
            .unwrap();
        let _ = store
            .add_row(
                &[(ColumnIndex(0), 1), (ColumnIndex(1), -1)],
                NEGATIVE_INFINITY,
                0,
                |_| (0, 10),
            )
            .unwrap();

        let column_to_variable = [VariableId(0), VariableId(1)];
        let variable_to_column: FnvHashMap<VariableId, ColumnIndex> = column_to_variable
            .iter()
            .enumerate()
            .map(|(index, &variable)| (variable, ColumnIndex(index as u32)))
            .collect();
        let options = RelaxationOptions {
            max_aggregation_rows: 1,
            ..RelaxationOptions::default()
        };
        let context = CutContext {
            store: &store,
            lp_values: &[1.2, 0.8],
            activities: &[2.0, 0.4],
            duals: &[1.0, 0.5],
            row_statuses: &[
                LpConstraintStatus::AtUpperBound,
                LpConstraintStatus::AtUpperBound,
            ],
            bounds: &[(0, 10), (0, 10)],
            column_to_variable: &column_to_variable,
            variable_to_column: &variable_to_column,
            objective_terms: &[],
            lp_objective: 0.0,
            best_objective_lower: None,
            options: &options,
        };

        // Start from the first tight row, eliminate y, fold the second row,
        // round with the only violating divisor.
        let mut random = TestRandom {
            weighted_choices: vec![0, 1, 0, 0],
            ..Default::default()
        };
        let mut aggregation = RowAccumulator::default();
        let mut extraction = RowAccumulator::default();
        let mut manager = SimpleConstraintManager::default();

        let accepted = generate(
            &context,
            &mut random,
            &mut aggregation,
            &mut extraction,
            &mut manager,
            &mut Indefinite,
        );

        assert_eq!(accepted, 1);
        let rows = manager.drain_accepted();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].terms, vec![(VariableId(0), 1)]);
        assert_eq!(rows[0].upper_bound, 1);
    }
}
