//! Cut generation: heuristics deriving new valid rows from the row store,
//! the current LP solution and the variable bounds.
//!
//! Each generator is a pure function of the [`CutContext`]; proposals funnel
//! through the shared [`candidate`] post-processing and are submitted to the
//! [`ConstraintManager`](crate::propagation::ConstraintManager).

pub(crate) mod candidate;
mod gomory;
mod knapsack;
mod mir;
mod objective;
mod rounding;
mod zero_half;

use fnv::FnvHashMap;

use crate::accumulator::RowAccumulator;
use crate::basic_types::Random;
use crate::cuts::candidate::CutCandidate;
use crate::lp::LpConstraintStatus;
use crate::options::RelaxationOptions;
use crate::propagation::ConstraintManager;
use crate::propagation::CutDiagnostics;
use crate::propagation::VariableId;
use crate::rows::ColumnIndex;
use crate::rows::RowId;
use crate::rows::RowStore;
use crate::rows::NEGATIVE_INFINITY;
use crate::rows::POSITIVE_INFINITY;
use crate::termination::TerminationCondition;

/// Everything a cut generator may look at, valid for one generation pass at
/// decision level zero.
pub(crate) struct CutContext<'a> {
    pub(crate) store: &'a RowStore,
    /// LP solution value per column, in exact units.
    pub(crate) lp_values: &'a [f64],
    /// LP activity per row, in exact units.
    pub(crate) activities: &'a [f64],
    /// Dual value per row.
    pub(crate) duals: &'a [f64],
    /// Basis status per row at the current solution.
    pub(crate) row_statuses: &'a [LpConstraintStatus],
    /// Level-zero bounds per column.
    pub(crate) bounds: &'a [(i64, i64)],
    pub(crate) column_to_variable: &'a [VariableId],
    pub(crate) variable_to_column: &'a FnvHashMap<VariableId, ColumnIndex>,
    /// Objective coefficients per column, sparse.
    pub(crate) objective_terms: &'a [(ColumnIndex, i64)],
    /// Floating-point objective value of the LP solution.
    pub(crate) lp_objective: f64,
    /// Best proven integer lower bound on the objective, if any.
    pub(crate) best_objective_lower: Option<i64>,
    pub(crate) options: &'a RelaxationOptions,
}

impl CutContext<'_> {
    pub(crate) fn width(&self) -> usize {
        self.column_to_variable.len()
    }

    pub(crate) fn column_of(&self, variable: VariableId) -> ColumnIndex {
        self.variable_to_column[&variable]
    }
}

/// The bound side a row is tight on at the current LP solution, encoded as
/// the multiplier sign under which the row may enter a `<=` combination.
/// Reads the solver's basis statuses; a row resting on a trivial or infinite
/// side is skipped.
pub(crate) fn tight_rows(context: &CutContext) -> Vec<(RowId, i64)> {
    context
        .store
        .row_ids()
        .filter_map(|row| match context.row_statuses[row.0 as usize] {
            LpConstraintStatus::AtUpperBound
                if context.store.upper_bound(row) != POSITIVE_INFINITY
                    && !context.store.upper_is_trivial(row) =>
            {
                Some((row, 1))
            }
            LpConstraintStatus::AtLowerBound
                if context.store.lower_bound(row) != NEGATIVE_INFINITY
                    && !context.store.lower_is_trivial(row) =>
            {
                Some((row, -1))
            }
            _ => None,
        })
        .collect()
}

/// Post-processes and submits one rounded candidate. The violation reported
/// to the manager is the candidate's own, measured at the LP point it was
/// derived from. Returns whether the manager accepted it.
pub(crate) fn submit_candidate(
    candidate: CutCandidate,
    name: &str,
    context: &CutContext,
    accumulator: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
) -> bool {
    let violation = candidate.violation();
    let Some(row) = candidate.into_derived_row(
        context.store,
        accumulator,
        context.width(),
        context.column_to_variable,
        |variable| context.column_of(variable),
    ) else {
        return false;
    };
    manager.add_cut(row, name, CutDiagnostics { violation })
}

/// Runs every generator once. `aggregation` is the scratch accumulator used
/// to combine rows, `extraction` the one used to rebuild submitted cuts.
/// Returns the number of accepted cuts.
#[allow(clippy::too_many_arguments)]
pub(crate) fn generate_all(
    context: &CutContext,
    tableau: &[(ColumnIndex, Vec<(RowId, f64)>)],
    random: &mut dyn Random,
    aggregation: &mut RowAccumulator,
    extraction: &mut RowAccumulator,
    manager: &mut dyn ConstraintManager,
    termination: &mut dyn TerminationCondition,
) -> usize {
    let mut accepted = 0;
    accepted += objective::generate(context, random, extraction, manager);
    if termination.should_stop() {
        return accepted;
    }
    accepted += mir::generate(context, random, aggregation, extraction, manager, termination);
    if termination.should_stop() {
        return accepted;
    }
    accepted += gomory::generate(
        context,
        tableau,
        aggregation,
        extraction,
        random,
        manager,
        termination,
    );
    if termination.should_stop() {
        return accepted;
    }
    accepted += zero_half::generate(context, aggregation, manager, termination);
    if termination.should_stop() {
        return accepted;
    }
    accepted += knapsack::generate(context, aggregation, extraction, manager, termination);
    accepted
}
