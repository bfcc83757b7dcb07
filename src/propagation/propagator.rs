//! The linear-relaxation propagator.
//!
//! Couples the exact row store to the external LP solver: per propagation
//! call it pushes the current variable bounds, resolves the relaxation,
//! derives integer-exact deductions from the solution, and, at decision
//! level zero, lets the cut generators tighten the relaxation before
//! re-solving. All level-tied state lives on checkpointed trails and is
//! discarded in bulk when the search backtracks.

use fnv::FnvHashMap;
use log::debug;
use log::trace;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::accumulator::LinearConstraintData;
use crate::accumulator::RowAccumulator;
use crate::basic_types::Trail;
use crate::create_statistics_struct;
use crate::cuts;
use crate::cuts::CutContext;
use crate::linrelax_assert_simple;
use crate::lp::BasisToken;
use crate::lp::CycleOutcome;
use crate::lp::LpConstraintStatus;
use crate::lp::LpSolver;
use crate::lp::ScalingBridge;
use crate::lp::SolveCycle;
use crate::options::RelaxationOptions;
use crate::propagation::Bound;
use crate::propagation::Conflict;
use crate::propagation::ConstraintManager;
use crate::propagation::PropagationStatus;
use crate::propagation::SearchTrail;
use crate::propagation::VariableId;
use crate::reasoner;
use crate::reasoner::ExactReasoner;
use crate::rows::ColumnIndex;
use crate::rows::RowAdditionError;
use crate::rows::RowId;
use crate::rows::RowStore;
use crate::rows::NEGATIVE_INFINITY;
use crate::rows::POSITIVE_INFINITY;
use crate::statistics::Statistic;
use crate::statistics::StatisticLogger;
use crate::termination::TerminationCondition;

create_statistics_struct!(
    /// Counters describing the work done by one propagator instance.
    RelaxationStatistics {
        num_calls: u64,
        num_lp_solves: u64,
        num_degenerate_solves: u64,
        /// Surrogate inequalities certified by exact reasoning.
        num_certified_constraints: u64,
        num_conflicts: u64,
        /// Rounds where no safe multiplier scale existed.
        num_scale_failures: u64,
        num_cut_rounds: u64,
        num_cuts_accepted: u64,
    }
);

/// The LP solution cached after a proven-optimal solve, in exact units.
///
/// Valid only at the decision level it was computed at; backtracking above
/// that level drops it.
#[derive(Clone, Debug)]
pub struct LpSolutionCache {
    /// Primal value per column.
    pub values: Vec<f64>,
    /// Reduced cost per column.
    pub reduced_costs: Vec<f64>,
    pub objective: f64,
    pub decision_level: usize,
}

/// States of one propagation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallState {
    Idle,
    Solved,
    CutsAdded,
    Done,
}

#[derive(Debug)]
pub struct LinearRelaxationPropagator<Lp> {
    lp: Lp,
    bridge: ScalingBridge,
    store: RowStore,
    reasoner: ExactReasoner,
    cycle: SolveCycle,
    /// Scratch accumulators: one for combining rows, one for rebuilding cuts.
    aggregation: RowAccumulator,
    extraction: RowAccumulator,
    options: RelaxationOptions,
    random: SmallRng,
    statistics: RelaxationStatistics,

    /// Fixed at construction; columns are assigned in sorted variable order.
    column_to_variable: Vec<VariableId>,
    variable_to_column: FnvHashMap<VariableId, ColumnIndex>,
    level_zero_bounds: Vec<(i64, i64)>,
    /// Sparse objective over columns, plus its dense mirror.
    objective: Vec<(ColumnIndex, i64)>,
    objective_dense: Vec<i64>,

    /// Upper bound `sum obj * var <= cutoff` from the incumbent solution.
    objective_cutoff: Option<i64>,
    /// Best proven integer lower bound on the objective.
    best_objective_lower: Option<i64>,

    cache: Option<LpSolutionCache>,
    basis: Option<BasisToken>,
    /// Surrogate inequalities certified at each level, pruned on backtrack.
    certified: Trail<LinearConstraintData>,
    /// Rows added at each level; truncating the store follows this trail.
    row_trail: Trail<RowId>,
    columns_installed: bool,
    attached_rows: usize,
}

impl<Lp: LpSolver> LinearRelaxationPropagator<Lp> {
    /// Creates a propagator over the given variables. The column order is the
    /// sorted variable order and never changes afterwards; `bounds` provides
    /// the level-zero domain per variable.
    pub fn new(
        lp: Lp,
        variables: &[VariableId],
        objective: &[(VariableId, i64)],
        bounds: impl Fn(VariableId) -> (i64, i64),
        options: RelaxationOptions,
    ) -> Self {
        let mut column_to_variable: Vec<VariableId> = variables.to_vec();
        column_to_variable.sort_unstable();
        column_to_variable.dedup();

        let variable_to_column: FnvHashMap<VariableId, ColumnIndex> = column_to_variable
            .iter()
            .enumerate()
            .map(|(index, &variable)| (variable, ColumnIndex(index as u32)))
            .collect();
        let level_zero_bounds = column_to_variable
            .iter()
            .map(|&variable| bounds(variable))
            .collect();

        let mut objective_dense = vec![0_i64; column_to_variable.len()];
        let objective: Vec<(ColumnIndex, i64)> = objective
            .iter()
            .filter(|&&(_, coefficient)| coefficient != 0)
            .map(|&(variable, coefficient)| {
                let column = variable_to_column[&variable];
                objective_dense[column.0 as usize] = coefficient;
                (column, coefficient)
            })
            .collect();

        let random = SmallRng::seed_from_u64(options.random_seed);
        LinearRelaxationPropagator {
            lp,
            bridge: ScalingBridge::default(),
            store: RowStore::default(),
            reasoner: ExactReasoner::default(),
            cycle: SolveCycle::new(),
            aggregation: RowAccumulator::default(),
            extraction: RowAccumulator::default(),
            options,
            random,
            statistics: RelaxationStatistics::default(),
            column_to_variable,
            variable_to_column,
            level_zero_bounds,
            objective,
            objective_dense,
            objective_cutoff: None,
            best_objective_lower: None,
            cache: None,
            basis: None,
            certified: Trail::default(),
            row_trail: Trail::default(),
            columns_installed: false,
            attached_rows: 0,
        }
    }

    fn width(&self) -> usize {
        self.column_to_variable.len()
    }

    /// Adds a constraint over variables known to the propagator. Malformed
    /// trivial rows are rejected immediately.
    pub fn add_row(
        &mut self,
        terms: &[(VariableId, i64)],
        lower_bound: i64,
        upper_bound: i64,
    ) -> Result<RowId, RowAdditionError> {
        let columns: Vec<(ColumnIndex, i64)> = terms
            .iter()
            .map(|&(variable, coefficient)| (self.variable_to_column[&variable], coefficient))
            .collect();
        let level_zero = &self.level_zero_bounds;
        let row = self.store.add_row(&columns, lower_bound, upper_bound, |column| {
            level_zero[column.0 as usize]
        })?;
        self.row_trail.push(row);
        if self.columns_installed {
            self.bridge.attach_row(&mut self.lp, &self.store, row);
            self.attached_rows = self.store.len();
        }
        Ok(row)
    }

    /// Tightens the bounds of a stored row; bounds may never loosen. The
    /// change is mirrored into the external model once the row is attached.
    pub fn tighten_row_bounds(&mut self, row: RowId, lower_bound: i64, upper_bound: i64) {
        self.store.tighten_bounds(row, lower_bound, upper_bound);
        if (row.0 as usize) < self.attached_rows {
            self.bridge.push_row_bounds(&mut self.lp, &self.store, row);
        }
    }

    /// Updates the objective knowledge: the best proven integer lower bound
    /// and the incumbent-derived cutoff `sum obj * var <= cutoff`.
    pub fn update_objective_bounds(&mut self, best_lower: Option<i64>, cutoff: Option<i64>) {
        if let Some(lower) = best_lower {
            self.best_objective_lower =
                Some(self.best_objective_lower.map_or(lower, |old| old.max(lower)));
        }
        if let Some(cutoff) = cutoff {
            self.objective_cutoff =
                Some(self.objective_cutoff.map_or(cutoff, |old| old.min(cutoff)));
        }
    }

    /// The solution cached by the last proven-optimal solve, if it is still
    /// valid for the current search position.
    pub fn cached_solution(&self) -> Option<&LpSolutionCache> {
        self.cache.as_ref()
    }

    /// Notes that the search tightened a bound of `variable`. A cached
    /// solution from before the change no longer describes the relaxation;
    /// changes to variables outside the relaxation keep it valid.
    pub fn notify_bound_change(&mut self, variable: VariableId) {
        if self.variable_to_column.contains_key(&variable) {
            self.cache = None;
        }
    }

    /// The surrogate inequalities certified at the currently active levels.
    pub fn certified_constraints(&self) -> &[LinearConstraintData] {
        &self.certified
    }

    pub fn statistics(&self) -> &RelaxationStatistics {
        &self.statistics
    }

    pub fn log_statistics(&self, logger: StatisticLogger) {
        self.statistics.log(logger);
    }

    /// Discards all state recorded at levels deeper than `level`: the
    /// certified records, the rows added during the abandoned subtree, and a
    /// now-invalid solution cache. Bulk truncation, O(items discarded).
    pub fn synchronise(&mut self, level: usize) {
        if self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.decision_level > level)
        {
            self.cache = None;
        }
        if self.certified.get_checkpoint() > level {
            let _ = self.certified.synchronise(level);
        }
        if self.row_trail.get_checkpoint() > level {
            let removed = self.row_trail.synchronise(level).count();
            let remaining = self.store.len() - removed;
            self.store.truncate(remaining);
            if self.attached_rows > remaining {
                self.bridge.truncate_rows(&mut self.lp, remaining);
                self.attached_rows = remaining;
            }
        }
    }

    /// One propagation call: the resolve loop of states
    /// Idle -> Solved -> (CutsAdded -> Solved)* -> Done, bounded by the cut
    /// round cap.
    pub fn propagate(
        &mut self,
        trail: &mut dyn SearchTrail,
        manager: &mut dyn ConstraintManager,
        termination: &mut dyn TerminationCondition,
    ) -> PropagationStatus {
        self.statistics.num_calls += 1;
        manager.start_call();
        let level = trail.decision_level();
        self.synchronise(level);
        while self.certified.get_checkpoint() < level {
            self.certified.new_checkpoint();
        }
        while self.row_trail.get_checkpoint() < level {
            self.row_trail.new_checkpoint();
        }
        self.ensure_columns_installed();
        self.activity_precheck(trail)?;

        let mut state = CallState::Idle;
        let mut rounds = 0_u32;
        loop {
            linrelax_assert_simple!(state == CallState::Idle || state == CallState::CutsAdded);
            self.push_current_bounds(trail);
            if let Some(token) = &self.basis {
                self.lp.restore_basis(token);
            }
            self.statistics.num_lp_solves += 1;
            let outcome = self
                .cycle
                .solve(&mut self.lp, &self.options, termination);
            state = CallState::Solved;
            trace!("lp outcome {outcome:?} in state {state:?}");

            match outcome {
                CycleOutcome::NoInformation => {
                    state = CallState::Done;
                    trace!("no lp information this round, finishing in state {state:?}");
                    return Ok(());
                }
                CycleOutcome::DualBound => {
                    // The duals of an early-stopped dual-feasible solve are
                    // valid for exact reasoning; the primal point is not, so
                    // neither the cache nor the cut generators see it.
                    self.exact_reason(trail)?;
                    state = CallState::Done;
                    trace!("dual bound only, finishing in state {state:?}");
                    return Ok(());
                }
                CycleOutcome::InfeasibleCertificate => {
                    self.statistics.num_conflicts += 1;
                    return Err(self.explain_infeasibility(trail));
                }
                CycleOutcome::Optimal => {
                    if self.cycle.last_solve_degenerate() {
                        self.statistics.num_degenerate_solves += 1;
                    }
                    self.basis = self.lp.save_basis();
                    self.cache_solution(level);
                    self.exact_reason(trail)?;

                    if level != 0 || rounds >= self.options.max_cut_rounds {
                        state = CallState::Done;
                        trace!("cut rounds exhausted, finishing in state {state:?}");
                        return Ok(());
                    }
                    rounds += 1;
                    self.statistics.num_cut_rounds += 1;
                    self.run_cut_generators(trail, manager, termination);
                    let accepted = manager.drain_accepted();
                    if accepted.is_empty() {
                        state = CallState::Done;
                        trace!("no cuts accepted, finishing in state {state:?}");
                        return Ok(());
                    }
                    for row in accepted {
                        match self.add_row(&row.terms, row.lower_bound, row.upper_bound) {
                            Ok(_) => self.statistics.num_cuts_accepted += 1,
                            Err(error) => debug!("discarding malformed cut: {error}"),
                        }
                    }
                    state = CallState::CutsAdded;
                }
            }
        }
    }

    fn ensure_columns_installed(&mut self) {
        if !self.columns_installed {
            let mut norms = vec![0_i64; self.width()];
            for row in self.store.row_ids() {
                let (columns, coefficients) = self.store.terms(row);
                for (&column, &coefficient) in columns.iter().zip(coefficients) {
                    let norm = &mut norms[column.0 as usize];
                    *norm = (*norm).max(coefficient.abs());
                }
            }
            let objective_dense = &self.objective_dense;
            let level_zero = &self.level_zero_bounds;
            self.bridge.install_columns(
                &mut self.lp,
                &norms,
                |column| objective_dense[column.0 as usize],
                |column| level_zero[column.0 as usize],
            );
            self.columns_installed = true;
        }
        for index in self.attached_rows..self.store.len() {
            self.bridge
                .attach_row(&mut self.lp, &self.store, RowId(index as u32));
        }
        self.attached_rows = self.store.len();
    }

    fn push_current_bounds(&mut self, trail: &dyn SearchTrail) {
        let column_to_variable = &self.column_to_variable;
        self.bridge.push_bounds(&mut self.lp, |column| {
            let variable = column_to_variable[column.0 as usize];
            (trail.lower_bound(variable), trail.upper_bound(variable))
        });
    }

    /// Cheap exact feasibility check over row activities; catches trivially
    /// infeasible states before any LP solve.
    fn activity_precheck(&mut self, trail: &mut dyn SearchTrail) -> PropagationStatus {
        for row in self.store.row_ids() {
            let column_to_variable = &self.column_to_variable;
            let bounds = |column: ColumnIndex| {
                let variable = column_to_variable[column.0 as usize];
                (trail.lower_bound(variable), trail.upper_bound(variable))
            };

            let upper = self.store.upper_bound(row);
            if upper != POSITIVE_INFINITY && self.store.min_activity(row, bounds) > upper {
                let reasons = self.activity_witness(row, trail, true);
                self.statistics.num_conflicts += 1;
                trail.report_conflict(reasons.clone());
                return Err(Conflict { reasons });
            }
            let lower = self.store.lower_bound(row);
            if lower != NEGATIVE_INFINITY && self.store.max_activity(row, bounds) < lower {
                let reasons = self.activity_witness(row, trail, false);
                self.statistics.num_conflicts += 1;
                trail.report_conflict(reasons.clone());
                return Err(Conflict { reasons });
            }
        }
        Ok(())
    }

    /// The variable bounds at which the violated activity was evaluated.
    fn activity_witness(
        &self,
        row: RowId,
        trail: &dyn SearchTrail,
        minimum_side: bool,
    ) -> Vec<Bound> {
        let (columns, coefficients) = self.store.terms(row);
        columns
            .iter()
            .zip(coefficients)
            .map(|(&column, &coefficient)| {
                let variable = self.column_to_variable[column.0 as usize];
                if (coefficient > 0) == minimum_side {
                    Bound::lower(variable, trail.lower_bound(variable))
                } else {
                    Bound::upper(variable, trail.upper_bound(variable))
                }
            })
            .collect()
    }

    fn cache_solution(&mut self, decision_level: usize) {
        let values: Vec<f64> = (0..self.width())
            .map(|index| self.bridge.variable_value(&self.lp, ColumnIndex(index as u32)))
            .collect();
        let reduced_costs: Vec<f64> = (0..self.width())
            .map(|index| self.bridge.reduced_cost(&self.lp, ColumnIndex(index as u32)))
            .collect();
        self.cache = Some(LpSolutionCache {
            values,
            reduced_costs,
            objective: self.lp.objective_value(),
            decision_level,
        });
    }

    /// Turns the solver's duals into an exact surrogate inequality and
    /// propagates it; the inequality is recorded at the current level.
    fn exact_reason(&mut self, trail: &mut dyn SearchTrail) -> PropagationStatus {
        let duals: Vec<(RowId, f64)> = self
            .store
            .row_ids()
            .map(|row| (row, self.bridge.dual_value(&self.lp, row)))
            .collect();

        let objective = self
            .objective_cutoff
            .map(|cutoff| (self.objective.as_slice(), cutoff));
        let extra_norm = objective.map_or(0, |(terms, cutoff)| {
            terms
                .iter()
                .map(|&(_, coefficient)| coefficient.abs())
                .max()
                .unwrap_or(0)
                .max(cutoff.abs())
        });

        let Some(scaled) =
            ExactReasoner::scale_dual_multipliers(&self.store, &duals, extra_norm)
        else {
            self.statistics.num_scale_failures += 1;
            return Ok(());
        };

        let column_to_variable = &self.column_to_variable;
        let bounds = |column: ColumnIndex| {
            let variable = column_to_variable[column.0 as usize];
            (trail.lower_bound(variable), trail.upper_bound(variable))
        };
        let Some(constraint) = self.reasoner.derive_inequality(
            &self.store,
            &scaled,
            objective,
            self.column_to_variable.len(),
            bounds,
            column_to_variable,
        ) else {
            self.statistics.num_scale_failures += 1;
            return Ok(());
        };

        self.statistics.num_certified_constraints += 1;
        self.certified.push(constraint.clone());
        let status = reasoner::propagate_inequality(&constraint, trail);
        if status.is_err() {
            self.statistics.num_conflicts += 1;
        }
        status
    }

    /// Explains LP infeasibility: exactly via the scaled infeasibility ray
    /// when possible, otherwise with the inexact bound explanation.
    fn explain_infeasibility(&mut self, trail: &mut dyn SearchTrail) -> Conflict {
        let ray: Vec<(RowId, f64)> = self
            .lp
            .infeasibility_ray()
            .into_iter()
            .filter_map(|(lp_row, weight)| {
                self.bridge.row_of_lp_row(lp_row).map(|row| (row, weight))
            })
            .collect();

        let column_to_variable = &self.column_to_variable;
        let bounds = |column: ColumnIndex| {
            let variable = column_to_variable[column.0 as usize];
            (trail.lower_bound(variable), trail.upper_bound(variable))
        };

        if let Some(scaled) = ExactReasoner::scale_dual_multipliers(&self.store, &ray, 0) {
            if let Some(constraint) = self.reasoner.derive_inequality(
                &self.store,
                &scaled,
                None,
                self.column_to_variable.len(),
                bounds,
                column_to_variable,
            ) {
                if let Err(conflict) = reasoner::propagate_inequality(&constraint, trail) {
                    self.statistics.num_certified_constraints += 1;
                    return conflict;
                }
            }
        }

        // Scaling failed or rounding lost the certificate: fall back to the
        // floating-point-derived explanation.
        self.statistics.num_scale_failures += 1;
        let involved = ray.iter().map(|&(row, _)| row);
        let conflict = reasoner::fallback_explanation(
            &self.store,
            involved,
            &self.column_to_variable,
            trail,
        );
        trail.report_conflict(conflict.reasons.clone());
        conflict
    }

    fn run_cut_generators(
        &mut self,
        trail: &dyn SearchTrail,
        manager: &mut dyn ConstraintManager,
        termination: &mut dyn TerminationCondition,
    ) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        // An all-fixed state has no fractional point to cut off.
        if self
            .column_to_variable
            .iter()
            .all(|&variable| trail.is_fixed(variable))
        {
            return;
        }
        let bounds: Vec<(i64, i64)> = self
            .column_to_variable
            .iter()
            .map(|&variable| (trail.lower_bound(variable), trail.upper_bound(variable)))
            .collect();
        let activities: Vec<f64> = self
            .store
            .row_ids()
            .map(|row| self.bridge.constraint_activity(&self.lp, row))
            .collect();
        let duals: Vec<f64> = self
            .store
            .row_ids()
            .map(|row| self.bridge.dual_value(&self.lp, row))
            .collect();
        let row_statuses: Vec<LpConstraintStatus> = self
            .store
            .row_ids()
            .map(|row| self.bridge.constraint_status(&self.lp, row))
            .collect();
        let tableau = self.fractional_basis_rows(&cache.values);

        let context = CutContext {
            store: &self.store,
            lp_values: &cache.values,
            activities: &activities,
            duals: &duals,
            row_statuses: &row_statuses,
            bounds: &bounds,
            column_to_variable: &self.column_to_variable,
            variable_to_column: &self.variable_to_column,
            objective_terms: &self.objective,
            lp_objective: cache.objective,
            best_objective_lower: self.best_objective_lower,
            options: &self.options,
        };
        let _ = cuts::generate_all(
            &context,
            &tableau,
            &mut self.random,
            &mut self.aggregation,
            &mut self.extraction,
            manager,
            termination,
        );
    }

    /// Basis row multipliers for every basic column with a fractional value.
    fn fractional_basis_rows(
        &self,
        lp_values: &[f64],
    ) -> Vec<(ColumnIndex, Vec<(RowId, f64)>)> {
        let tolerance = self.options.violation_tolerance;
        (0..self.width())
            .filter_map(|index| {
                let column = ColumnIndex(index as u32);
                if !self.bridge.is_basic(&self.lp, column) {
                    return None;
                }
                let fraction = lp_values[index] - lp_values[index].floor();
                if fraction <= tolerance || fraction >= 1.0 - tolerance {
                    return None;
                }
                let multipliers: Vec<(RowId, f64)> = self
                    .lp
                    .basis_row_multipliers(self.bridge.lp_column(column))
                    .into_iter()
                    .filter_map(|(lp_row, weight)| {
                        self.bridge.row_of_lp_row(lp_row).map(|row| (row, weight))
                    })
                    .collect();
                (!multipliers.is_empty()).then_some((column, multipliers))
            })
            .collect()
    }
}
