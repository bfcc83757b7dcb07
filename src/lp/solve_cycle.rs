//! Invocation of the external solver with an adaptive iteration budget.

use log::debug;
use log::trace;

use crate::lp::LpColIndex;
use crate::lp::LpSolver;
use crate::lp::LpStatus;
use crate::options::RelaxationOptions;
use crate::termination::TerminationCondition;

/// What one solve produced, from the propagator's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// A proven optimal solution; solution data may be cached.
    Optimal,
    /// The solver stopped early but dual-feasible: its duals carry a valid
    /// objective bound, the primal values prove nothing.
    DualBound,
    /// Proven infeasibility; an infeasibility ray is available.
    InfeasibleCertificate,
    /// Solver failure or exhausted budget. Non-fatal: no propagation this
    /// round, the previous cached solution (if level-valid) stays untouched.
    NoInformation,
}

/// Runs the external solver and interprets its status.
///
/// The iteration budget grows with problem size and is cut sharply after a
/// degenerate solve (at least [`RelaxationOptions::degeneracy_threshold`] of
/// the non-basic columns with a zero reduced cost).
#[derive(Debug)]
pub(crate) struct SolveCycle {
    budget_factor: u64,
    /// Whether the most recent proven-optimal solve was degenerate.
    last_solve_degenerate: bool,
}

impl SolveCycle {
    pub(crate) fn new() -> SolveCycle {
        SolveCycle {
            budget_factor: 1,
            last_solve_degenerate: false,
        }
    }

    pub(crate) fn last_solve_degenerate(&self) -> bool {
        self.last_solve_degenerate
    }

    pub(crate) fn solve(
        &mut self,
        lp: &mut impl LpSolver,
        options: &RelaxationOptions,
        termination: &mut dyn TerminationCondition,
    ) -> CycleOutcome {
        if termination.should_stop() {
            return CycleOutcome::NoInformation;
        }

        let budget = self.iteration_budget(lp.num_variables(), options);
        trace!("lp solve with iteration budget {budget}");
        let status = lp.solve(budget);

        match status {
            LpStatus::Optimal => {
                self.update_degeneracy(lp, options);
                CycleOutcome::Optimal
            }
            LpStatus::DualFeasible => CycleOutcome::DualBound,
            LpStatus::Infeasible => CycleOutcome::InfeasibleCertificate,
            LpStatus::IterationLimit | LpStatus::NumericalError => {
                debug!("lp solve produced no information: {status:?}");
                // Recover the budget slowly after a failure.
                self.budget_factor = (self.budget_factor * 2).min(1 << 10);
                CycleOutcome::NoInformation
            }
        }
    }

    fn iteration_budget(&self, num_columns: usize, options: &RelaxationOptions) -> u64 {
        let base = options.base_iterations
            + options.iterations_per_column * num_columns as u64;
        let budget = if self.last_solve_degenerate {
            base / options.degeneracy_budget_divisor.max(1)
        } else {
            base.saturating_mul(self.budget_factor)
        };
        budget.clamp(options.min_iterations, options.max_iterations)
    }

    fn update_degeneracy(&mut self, lp: &impl LpSolver, options: &RelaxationOptions) {
        let mut non_basic = 0_usize;
        let mut zero_reduced_cost = 0_usize;
        for index in 0..lp.num_variables() {
            let column = LpColIndex(index as u32);
            if lp.is_basic(column) {
                continue;
            }
            non_basic += 1;
            if lp.reduced_cost(column).abs() <= options.zero_reduced_cost_tolerance {
                zero_reduced_cost += 1;
            }
        }

        let was_degenerate = self.last_solve_degenerate;
        self.last_solve_degenerate = non_basic > 0
            && zero_reduced_cost as f64 >= options.degeneracy_threshold * non_basic as f64;
        if self.last_solve_degenerate && !was_degenerate {
            debug!(
                "lp is degenerate: {zero_reduced_cost}/{non_basic} non-basic columns with zero reduced cost"
            );
        }
        if !self.last_solve_degenerate {
            self.budget_factor = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_solves_cut_the_budget() {
        let options = RelaxationOptions::default();
        let mut cycle = SolveCycle::new();
        let healthy = cycle.iteration_budget(10, &options);

        cycle.last_solve_degenerate = true;
        let degenerate = cycle.iteration_budget(10, &options);

        assert!(degenerate < healthy);
        assert!(degenerate >= options.min_iterations);
    }

    #[test]
    fn budget_grows_with_problem_size() {
        let options = RelaxationOptions::default();
        let cycle = SolveCycle::new();
        assert!(cycle.iteration_budget(1_000, &options) > cycle.iteration_budget(10, &options));
    }
}
