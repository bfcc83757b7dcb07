//! Exact integer reasoning over inexact LP dual information.
//!
//! The solver hands back floating-point dual values (or an infeasibility ray).
//! This module turns them into an integer-exact surrogate inequality: the
//! multipliers are negated and scaled by a power of two chosen so the whole
//! combination provably fits in the safe integer range, applied through the
//! [`RowAccumulator`], and the result is propagated independently of any
//! floating-point rounding. When no safe scale exists the round is abandoned
//! and the caller falls back to weaker floating-point reasoning.

use log::trace;

use crate::accumulator::LinearConstraintData;
use crate::accumulator::RowAccumulator;
use crate::linrelax_assert_moderate;
use crate::math::checked_ops;
use crate::math::num_ext::NumExt;
use crate::propagation::Bound;
use crate::propagation::Conflict;
use crate::propagation::PropagationStatus;
use crate::propagation::SearchTrail;
use crate::propagation::VariableId;
use crate::rows::ColumnIndex;
use crate::rows::NEGATIVE_INFINITY;
use crate::rows::POSITIVE_INFINITY;
use crate::rows::RowId;
use crate::rows::RowStore;

/// Scales beyond `2^MAX_SCALE_LOG2` gain no dual precision worth the range.
const MAX_SCALE_LOG2: u32 = 40;

/// Integer row multipliers obtained from floating-point duals, together with
/// the power-of-two factor by which they were scaled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ScaledMultipliers {
    /// Nonzero multipliers only, in row order.
    pub(crate) multipliers: Vec<(RowId, i64)>,
    /// Power of two; all multipliers approximate `-scale * dual`.
    pub(crate) scale: i64,
}

#[derive(Debug, Default)]
pub(crate) struct ExactReasoner {
    accumulator: RowAccumulator,
}

impl ExactReasoner {
    /// Negates and scales the dual multipliers by the largest power of two
    /// under which the full row combination (plus a reserved `extra_norm`
    /// budget for the objective row) provably cannot overflow.
    ///
    /// Returns [`None`] when no scale yields a safe, nonzero combination.
    pub(crate) fn scale_dual_multipliers(
        store: &RowStore,
        duals: &[(RowId, f64)],
        extra_norm: i64,
    ) -> Option<ScaledMultipliers> {
        let mut chosen = None;
        let mut scale = 1_i64;
        for _ in 0..=MAX_SCALE_LOG2 {
            if !combination_is_safe(store, duals, scale, extra_norm) {
                break;
            }
            chosen = Some(scale);
            scale *= 2;
        }
        let scale = chosen?;

        let multipliers: Vec<(RowId, i64)> = duals
            .iter()
            .filter_map(|&(row, dual)| {
                let multiplier = (-dual * scale as f64).round() as i64;
                (multiplier != 0).then_some((row, multiplier))
            })
            .collect();
        if multipliers.is_empty() {
            return None;
        }
        trace!(
            "scaled {} dual multipliers with factor {scale}",
            multipliers.len()
        );
        Some(ScaledMultipliers { multipliers, scale })
    }

    /// Applies the scaled multipliers (and, when a finite objective cutoff is
    /// known, the objective row `sum obj_coeff * var <= cutoff` weighted by
    /// the scale itself) to obtain one surrogate inequality, then greedily
    /// nudges multipliers by one where that tightens the inequality.
    ///
    /// Returns [`None`] on overflow or when a multiplier leans on an infinite
    /// row bound; both abandon exact reasoning for this round.
    pub(crate) fn derive_inequality(
        &mut self,
        store: &RowStore,
        scaled: &ScaledMultipliers,
        objective: Option<(&[(ColumnIndex, i64)], i64)>,
        width: usize,
        bounds: impl Fn(ColumnIndex) -> (i64, i64) + Copy,
        column_to_variable: &[VariableId],
    ) -> Option<LinearConstraintData> {
        let bound = self.combine(store, scaled, objective, width)?;
        let bound = self.nudge_multipliers(store, scaled, bound, bounds);
        self.accumulator
            .to_linear_constraint(column_to_variable, bound, None)
    }

    fn combine(
        &mut self,
        store: &RowStore,
        scaled: &ScaledMultipliers,
        objective: Option<(&[(ColumnIndex, i64)], i64)>,
        width: usize,
    ) -> Option<i64> {
        self.accumulator.clear_and_resize(width);
        let mut bound = 0_i64;

        if let Some((objective_terms, cutoff)) = objective {
            for &(column, coefficient) in objective_terms {
                let product = checked_ops::checked_mul(scaled.scale, coefficient)?;
                if !self.accumulator.add(column, product) {
                    return None;
                }
            }
            bound = checked_ops::checked_mul(scaled.scale, cutoff)?;
        }

        for &(row, multiplier) in &scaled.multipliers {
            let (columns, coefficients) = store.terms(row);
            if !self.accumulator.add_scaled_row(multiplier, columns, coefficients) {
                return None;
            }
            let side = multiplier_side(store, row, multiplier)?;
            bound = checked_ops::checked_mul_add(multiplier, side, bound)?;
        }
        Some(bound)
    }

    /// The greedy tightening pass over the multipliers. Each row multiplier
    /// is nudged by one, in either direction, whenever that shrinks the slack
    /// of the surrogate inequality without flipping the sign of any touched
    /// coefficient. Overflow or an infinite row bound simply skips the nudge.
    fn nudge_multipliers(
        &mut self,
        store: &RowStore,
        scaled: &ScaledMultipliers,
        mut bound: i64,
        bounds: impl Fn(ColumnIndex) -> (i64, i64) + Copy,
    ) -> i64 {
        let Some(mut min_activity) = self.accumulated_min_activity(bounds) else {
            return bound;
        };

        let mut multipliers = scaled.multipliers.clone();
        for index in 0..multipliers.len() {
            let (row, multiplier) = multipliers[index];
            for delta in [1_i64, -1] {
                let Some(outcome) = self.try_nudge(
                    store,
                    row,
                    multiplier,
                    delta,
                    bound,
                    min_activity,
                    bounds,
                ) else {
                    continue;
                };
                bound = outcome.bound;
                min_activity = outcome.min_activity;
                multipliers[index].1 = multiplier + delta;
                break;
            }
        }
        bound
    }

    /// Validates and, when it tightens, applies one `delta` nudge of the
    /// multiplier of `row`. Returns the updated bound and minimum activity,
    /// or [`None`] when the nudge is invalid or does not tighten.
    #[allow(clippy::too_many_arguments)]
    fn try_nudge(
        &mut self,
        store: &RowStore,
        row: RowId,
        multiplier: i64,
        delta: i64,
        bound: i64,
        min_activity: i64,
        bounds: impl Fn(ColumnIndex) -> (i64, i64) + Copy,
    ) -> Option<NudgeOutcome> {
        let new_multiplier = checked_ops::checked_add(multiplier, delta)?;
        if new_multiplier == 0 {
            // Dropping a row entirely is not a nudge.
            return None;
        }
        let old_side_term = side_contribution(store, row, multiplier)?;
        let new_side_term = side_contribution(store, row, new_multiplier)?;
        let new_bound =
            checked_ops::checked_add(bound, new_side_term.checked_sub(old_side_term)?)?;

        // Dry run over the row's columns: sign preservation and the change in
        // the minimum activity, without mutating the accumulator.
        let (columns, coefficients) = store.terms(row);
        let mut new_min_activity = min_activity;
        for (&column, &coefficient) in columns.iter().zip(coefficients) {
            let before = self.accumulator.value(column);
            let step = checked_ops::checked_mul(delta, coefficient)?;
            let after = checked_ops::checked_add(before, step)?;
            if before.signum() * after.signum() < 0 {
                return None;
            }
            let (lower, upper) = bounds(column);
            let before_term = min_side_contribution(before, lower, upper)?;
            let after_term = min_side_contribution(after, lower, upper)?;
            new_min_activity = checked_ops::checked_add(
                new_min_activity,
                after_term.checked_sub(before_term)?,
            )?;
        }

        let old_slack = bound.checked_sub(min_activity)?;
        let new_slack = new_bound.checked_sub(new_min_activity)?;
        if new_slack >= old_slack {
            return None;
        }

        let applied = self.accumulator.add_scaled_row(delta, columns, coefficients);
        // The dry run above already proved every column addition safe.
        linrelax_assert_moderate!(applied);
        Some(NudgeOutcome {
            bound: new_bound,
            min_activity: new_min_activity,
        })
    }

    fn accumulated_min_activity(
        &self,
        bounds: impl Fn(ColumnIndex) -> (i64, i64),
    ) -> Option<i64> {
        let mut activity = 0_i64;
        for (index, coefficient) in self.accumulator.nonzero_entries() {
            let (lower, upper) = bounds(ColumnIndex(index as u32));
            let term = min_side_contribution(coefficient, lower, upper)?;
            activity = checked_ops::checked_add(activity, term)?;
        }
        Some(activity)
    }
}

#[derive(Clone, Copy, Debug)]
struct NudgeOutcome {
    bound: i64,
    min_activity: i64,
}

/// Propagates `sum coeff * var <= upper_bound` against the trail.
///
/// Either reports a conflict (with the variable bounds that witness it as
/// reasons) or enqueues every implied bound tightening, in term order. An
/// overflow while evaluating the activity silently skips this inequality.
pub(crate) fn propagate_inequality(
    constraint: &LinearConstraintData,
    trail: &mut dyn SearchTrail,
) -> PropagationStatus {
    let Some(min_activity) = constraint_min_activity(constraint, trail) else {
        return Ok(());
    };

    if min_activity > constraint.upper_bound {
        let reasons = witness_bounds(constraint, trail, None);
        trail.report_conflict(reasons.clone());
        return Err(Conflict { reasons });
    }

    for (index, &(variable, coefficient)) in constraint.terms.iter().enumerate() {
        let own_bound = if coefficient > 0 {
            trail.lower_bound(variable)
        } else {
            trail.upper_bound(variable)
        };
        // min_activity already counts this term at its own bound; lift it out.
        let Some(own_term) = checked_ops::checked_mul(coefficient, own_bound) else {
            continue;
        };
        let Some(rest) = min_activity.checked_sub(own_term) else {
            continue;
        };
        let Some(available) = constraint.upper_bound.checked_sub(rest) else {
            continue;
        };

        let deduction = if coefficient > 0 {
            let new_upper = available.div_floor(coefficient);
            if new_upper >= trail.upper_bound(variable) {
                continue;
            }
            Bound::upper(variable, new_upper)
        } else {
            let new_lower = available.div_ceil(coefficient);
            if new_lower <= trail.lower_bound(variable) {
                continue;
            }
            Bound::lower(variable, new_lower)
        };

        let reasons = witness_bounds(constraint, trail, Some(index));
        if !trail.enqueue(deduction, reasons.clone()) {
            trail.report_conflict(reasons.clone());
            return Err(Conflict { reasons });
        }
    }
    Ok(())
}

/// The inexact fallback explanation used when no safe multiplier scale
/// exists: the current bounds of every variable occurring in the given rows.
pub(crate) fn fallback_explanation(
    store: &RowStore,
    rows: impl Iterator<Item = RowId>,
    column_to_variable: &[VariableId],
    trail: &dyn SearchTrail,
) -> Conflict {
    let mut seen = vec![false; column_to_variable.len()];
    let mut reasons = Vec::new();
    for row in rows {
        let (columns, _) = store.terms(row);
        for &column in columns {
            let index = column.0 as usize;
            if seen[index] {
                continue;
            }
            seen[index] = true;
            let variable = column_to_variable[index];
            reasons.push(Bound::lower(variable, trail.lower_bound(variable)));
            reasons.push(Bound::upper(variable, trail.upper_bound(variable)));
        }
    }
    Conflict { reasons }
}

fn constraint_min_activity(
    constraint: &LinearConstraintData,
    trail: &dyn SearchTrail,
) -> Option<i64> {
    let mut activity = 0_i64;
    for &(variable, coefficient) in &constraint.terms {
        let bound = if coefficient > 0 {
            trail.lower_bound(variable)
        } else {
            trail.upper_bound(variable)
        };
        activity = checked_ops::checked_mul_add(coefficient, bound, activity)?;
    }
    Some(activity)
}

/// The bounds at which the minimum activity was evaluated, excluding the term
/// at `skip` (the one being propagated).
fn witness_bounds(
    constraint: &LinearConstraintData,
    trail: &dyn SearchTrail,
    skip: Option<usize>,
) -> Vec<Bound> {
    constraint
        .terms
        .iter()
        .enumerate()
        .filter(|&(index, _)| Some(index) != skip)
        .map(|(_, &(variable, coefficient))| {
            if coefficient > 0 {
                Bound::lower(variable, trail.lower_bound(variable))
            } else {
                Bound::upper(variable, trail.upper_bound(variable))
            }
        })
        .collect()
}

/// The row bound a multiplier leans on; [`None`] when that side is infinite.
fn multiplier_side(store: &RowStore, row: RowId, multiplier: i64) -> Option<i64> {
    let side = if multiplier > 0 {
        store.upper_bound(row)
    } else {
        store.lower_bound(row)
    };
    (side != NEGATIVE_INFINITY && side != POSITIVE_INFINITY).then_some(side)
}

fn side_contribution(store: &RowStore, row: RowId, multiplier: i64) -> Option<i64> {
    if multiplier == 0 {
        return Some(0);
    }
    let side = multiplier_side(store, row, multiplier)?;
    checked_ops::checked_mul(multiplier, side)
}

/// The contribution of one accumulated coefficient to the minimum activity.
fn min_side_contribution(coefficient: i64, lower: i64, upper: i64) -> Option<i64> {
    if coefficient == 0 {
        return Some(0);
    }
    let bound = if coefficient > 0 { lower } else { upper };
    checked_ops::checked_mul(coefficient, bound)
}

fn combination_is_safe(
    store: &RowStore,
    duals: &[(RowId, f64)],
    scale: i64,
    extra_norm: i64,
) -> bool {
    let Some(reserved) = checked_ops::checked_mul(scale, extra_norm) else {
        return false;
    };
    let mut total = reserved.abs();
    for &(row, dual) in duals {
        let magnitude = (dual.abs() * scale as f64).round();
        if magnitude > checked_ops::MAX_SAFE_MAGNITUDE as f64 {
            return false;
        }
        let Some(weighted) =
            checked_ops::checked_mul(magnitude as i64, store.infinity_norm(row))
        else {
            return false;
        };
        total = match checked_ops::checked_add(total, weighted) {
            Some(value) => value,
            None => return false,
        };
    }
    checked_ops::in_safe_range(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::TestTrail;

    fn unit_bounds(_: ColumnIndex) -> (i64, i64) {
        (0, 10)
    }

    fn store_with_rows(rows: &[(&[(ColumnIndex, i64)], i64, i64)]) -> RowStore {
        let mut store = RowStore::default();
        for &(terms, lower, upper) in rows {
            let _ = store.add_row(terms, lower, upper, unit_bounds).unwrap();
        }
        store
    }

    #[test]
    fn fractional_duals_are_scaled_to_nonzero_integers() {
        let store = store_with_rows(&[(&[(ColumnIndex(0), 3)], 0, 9)]);
        let scaled =
            ExactReasoner::scale_dual_multipliers(&store, &[(RowId(0), -0.5)], 0).unwrap();
        assert_eq!(scaled.scale.count_ones(), 1, "scale must be a power of two");
        // -(-0.5 * scale) rounds to scale / 2.
        assert_eq!(scaled.multipliers, vec![(RowId(0), scaled.scale / 2)]);
    }

    #[test]
    fn oversized_duals_admit_no_safe_scale() {
        let store = store_with_rows(&[(
            &[(ColumnIndex(0), crate::math::checked_ops::MAX_SAFE_MAGNITUDE / 2)],
            0,
            1,
        )]);
        let result =
            ExactReasoner::scale_dual_multipliers(&store, &[(RowId(0), 1e10)], 0);
        assert!(result.is_none());
    }

    #[test]
    fn near_zero_duals_yield_no_multipliers() {
        let store = store_with_rows(&[(&[(ColumnIndex(0), 1)], 0, 1)]);
        let result =
            ExactReasoner::scale_dual_multipliers(&store, &[(RowId(0), 0.0)], 0);
        assert!(result.is_none());
    }

    #[test]
    fn combination_uses_the_bound_side_matching_the_multiplier_sign() {
        let store = store_with_rows(&[
            (&[(ColumnIndex(0), 3)], 0, 9),
            (&[(ColumnIndex(1), 2)], 4, 20),
        ]);
        let scaled = ScaledMultipliers {
            multipliers: vec![(RowId(0), 2), (RowId(1), -1)],
            scale: 1,
        };
        let mut reasoner = ExactReasoner::default();
        // 2 * (3x <= 9) plus -1 * (2y >= 4): 6x - 2y <= 18 - 4, then gcd 2.
        // Both rows bind at x = 3, y = 2, so the nudge pass changes nothing.
        let bounds = |column: ColumnIndex| if column == ColumnIndex(0) { (3, 3) } else { (2, 2) };
        let constraint = reasoner
            .derive_inequality(
                &store,
                &scaled,
                None,
                2,
                bounds,
                &[VariableId(0), VariableId(1)],
            )
            .unwrap();
        assert_eq!(
            constraint.terms,
            vec![(VariableId(0), 3), (VariableId(1), -1)]
        );
        assert_eq!(constraint.upper_bound, 7);
    }

    #[test]
    fn objective_cutoff_joins_the_combination() {
        let store = store_with_rows(&[(&[(ColumnIndex(0), 1)], 0, 5)]);
        let scaled = ScaledMultipliers {
            multipliers: vec![(RowId(0), -2)],
            scale: 2,
        };
        let mut reasoner = ExactReasoner::default();
        // 2 * (4x <= cutoff 7) plus -2 * (x >= 0): 6x <= 14, then gcd 6.
        let constraint = reasoner
            .derive_inequality(
                &store,
                &scaled,
                Some((&[(ColumnIndex(0), 4)], 7)),
                1,
                |_| (0, 0),
                &[VariableId(0)],
            )
            .unwrap();
        assert_eq!(constraint.terms, vec![(VariableId(0), 1)]);
        assert_eq!(constraint.upper_bound, 2);
    }

    #[test]
    fn multiplier_leaning_on_an_infinite_bound_aborts() {
        let store =
            store_with_rows(&[(&[(ColumnIndex(0), 1)], 0, POSITIVE_INFINITY)]);
        let scaled = ScaledMultipliers {
            multipliers: vec![(RowId(0), 1)],
            scale: 1,
        };
        let mut reasoner = ExactReasoner::default();
        let result = reasoner.derive_inequality(
            &store,
            &scaled,
            None,
            1,
            |_| (0, 0),
            &[VariableId(0)],
        );
        assert!(result.is_none());
    }

    #[test]
    fn propagation_tightens_upper_bounds() {
        let constraint = LinearConstraintData {
            terms: vec![(VariableId(0), 2), (VariableId(1), 1)],
            upper_bound: 7,
        };
        let mut trail = TestTrail::new(&[(0, 10), (1, 10)]);
        assert!(propagate_inequality(&constraint, &mut trail).is_ok());
        // 2x + y <= 7 with y >= 1: x <= 3; with x >= 0: y <= 7.
        assert_eq!(trail.upper_bound(VariableId(0)), 3);
        assert_eq!(trail.upper_bound(VariableId(1)), 7);
    }

    #[test]
    fn propagation_tightens_lower_bounds_through_negative_coefficients() {
        let constraint = LinearConstraintData {
            terms: vec![(VariableId(0), -3)],
            upper_bound: -7,
        };
        let mut trail = TestTrail::new(&[(0, 10)]);
        assert!(propagate_inequality(&constraint, &mut trail).is_ok());
        // -3x <= -7: x >= ceil(7 / 3) = 3.
        assert_eq!(trail.lower_bound(VariableId(0)), 3);
    }

    #[test]
    fn violated_inequality_is_reported_with_witness_bounds() {
        let constraint = LinearConstraintData {
            terms: vec![(VariableId(0), 1), (VariableId(1), 1)],
            upper_bound: 3,
        };
        let mut trail = TestTrail::new(&[(2, 10), (2, 10)]);
        let conflict = propagate_inequality(&constraint, &mut trail).unwrap_err();
        assert_eq!(
            conflict.reasons,
            vec![Bound::lower(VariableId(0), 2), Bound::lower(VariableId(1), 2)]
        );
        assert_eq!(trail.conflicts.len(), 1);
    }

    #[test]
    fn satisfiable_states_never_conflict() {
        // x = 1, y = 2 satisfies the inequality; no conflict may be reported.
        let constraint = LinearConstraintData {
            terms: vec![(VariableId(0), 2), (VariableId(1), 1)],
            upper_bound: 4,
        };
        let mut trail = TestTrail::new(&[(1, 1), (2, 2)]);
        assert!(propagate_inequality(&constraint, &mut trail).is_ok());
        assert!(trail.conflicts.is_empty());
    }

    #[test]
    fn nudging_cancels_a_column_when_that_shrinks_the_slack() {
        // 3 * (x + y <= 5) plus -2 * (x - y >= 1) gives x + 5y <= 13 with
        // slack 13 over x, y in [0, 4]. Nudging the first multiplier down to 2
        // cancels x and leaves 4y <= 8 with slack 8, which the pass accepts.
        let store = store_with_rows(&[
            (&[(ColumnIndex(0), 1), (ColumnIndex(1), 1)], 0, 5),
            (&[(ColumnIndex(0), 1), (ColumnIndex(1), -1)], 1, 4),
        ]);
        let scaled = ScaledMultipliers {
            multipliers: vec![(RowId(0), 3), (RowId(1), -2)],
            scale: 1,
        };
        let mut reasoner = ExactReasoner::default();
        let constraint = reasoner
            .derive_inequality(
                &store,
                &scaled,
                None,
                2,
                |_| (0, 4),
                &[VariableId(0), VariableId(1)],
            )
            .unwrap();
        assert_eq!(constraint.terms, vec![(VariableId(1), 1)]);
        assert_eq!(constraint.upper_bound, 2);
    }
}
