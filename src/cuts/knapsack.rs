//! Cover cuts for knapsack-shaped rows over binary-range terms.
//!
//! A row whose complemented form is `sum c * t <= b` with every term binary
//! admits a cover cut: for any subset whose coefficients sum beyond `b`, not
//! all of its terms can be one. The cover is grown greedily by LP value, then
//! shrunk to a minimal one.

use crate::accumulator::RowAccumulator;
use crate::cuts::candidate::CutCandidate;
use crate::cuts::submit_candidate;
use crate::cuts::CutContext;
use crate::propagation::ConstraintManager;
use crate::rows::POSITIVE_INFINITY;
use crate::termination::TerminationCondition;

pub(crate) fn generate(
    context: &CutContext,
    aggregation: &mut RowAccumulator,
    extraction: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
    termination: &mut dyn TerminationCondition,
) -> usize {
    let mut accepted = 0;
    for row in context.store.row_ids() {
        if termination.should_stop() {
            break;
        }
        let upper = context.store.upper_bound(row);
        if upper == POSITIVE_INFINITY || context.store.upper_is_trivial(row) {
            continue;
        }

        aggregation.clear_and_resize(context.width());
        let (columns, coefficients) = context.store.terms(row);
        if !aggregation.add_scaled_row(1, columns, coefficients) {
            continue;
        }
        let Some(data) = aggregation.to_cut_data(
            context.column_to_variable,
            upper,
            context.lp_values,
            context.bounds,
        ) else {
            continue;
        };
        let Some(candidate) = CutCandidate::from_cut_data(&data) else {
            continue;
        };
        if candidate.terms.iter().any(|term| term.range != 1) {
            continue;
        }

        let Some(cover) = find_cover(&candidate, context) else {
            continue;
        };
        accepted += usize::from(submit_candidate(cover, "knapsack", context, extraction, manager));
    }
    accepted
}

/// Greedily covers the bound with the terms of highest LP value, minimises
/// the cover, and checks that the resulting cut is violated.
fn find_cover(candidate: &CutCandidate, context: &CutContext) -> Option<CutCandidate> {
    let mut order: Vec<usize> = (0..candidate.terms.len()).collect();
    order.sort_by(|&a, &b| {
        candidate.terms[b]
            .lp_value
            .total_cmp(&candidate.terms[a].lp_value)
    });

    let mut cover = Vec::new();
    let mut weight = 0_i64;
    for index in order {
        weight = weight.checked_add(candidate.terms[index].coefficient)?;
        cover.push(index);
        if weight > candidate.upper_bound {
            break;
        }
    }
    if weight <= candidate.upper_bound {
        return None;
    }

    // Minimise: drop the lightest members while the rest still covers.
    cover.sort_by_key(|&index| candidate.terms[index].coefficient);
    let mut kept = Vec::new();
    for &index in &cover {
        let coefficient = candidate.terms[index].coefficient;
        if weight - coefficient > candidate.upper_bound {
            weight -= coefficient;
        } else {
            kept.push(index);
        }
    }
    if kept.is_empty() {
        return None;
    }

    let cut_terms: Vec<_> = kept
        .iter()
        .map(|&index| {
            let mut term = candidate.terms[index].clone();
            term.coefficient = 1;
            term
        })
        .collect();
    let cut_bound = kept.len() as i64 - 1;
    let activity: f64 = cut_terms.iter().map(|term| term.lp_value).sum();
    let violation = activity - cut_bound as f64;
    if violation < context.options.violation_tolerance {
        return None;
    }
    Some(CutCandidate {
        terms: cut_terms,
        upper_bound: cut_bound,
    })
}
