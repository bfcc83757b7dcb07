//! Policy knobs of the propagator.
//!
//! All values here bound cost, never soundness: changing them may alter which
//! cuts or deductions are found, but never allows an unsound one.

/// Configuration of the linear-relaxation propagator.
#[derive(Clone, Copy, Debug)]
pub struct RelaxationOptions {
    /// The maximum number of cut rounds per propagation call at decision level zero.
    pub max_cut_rounds: u32,
    /// The maximum number of additional tight rows folded into one aggregated cut.
    pub max_aggregation_rows: u32,
    /// A solve counts as degenerate when at least this fraction of the non-basic
    /// columns has a zero reduced cost.
    pub degeneracy_threshold: f64,
    /// The factor by which the iteration budget is cut after a degenerate solve.
    pub degeneracy_budget_divisor: u64,
    /// Base number of simplex iterations granted per solve.
    pub base_iterations: u64,
    /// Additional iterations granted per LP column.
    pub iterations_per_column: u64,
    /// Lower clamp of the adaptive iteration budget.
    pub min_iterations: u64,
    /// Upper clamp of the adaptive iteration budget.
    pub max_iterations: u64,
    /// A cut is rejected when it is violated by less than this amount at the current LP solution.
    pub violation_tolerance: f64,
    /// A reduced cost below this magnitude is treated as zero when measuring degeneracy.
    pub zero_reduced_cost_tolerance: f64,
    /// The largest infinity norm with which the objective cut is added verbatim; above it the
    /// rounding/knapsack fallbacks are used instead.
    pub objective_norm_limit: i64,
    /// Seed of the per-propagator random generator used by the cut heuristics.
    pub random_seed: u64,
}

impl Default for RelaxationOptions {
    fn default() -> Self {
        RelaxationOptions {
            max_cut_rounds: 4,
            max_aggregation_rows: 5,
            degeneracy_threshold: 0.3,
            degeneracy_budget_divisor: 4,
            base_iterations: 2_000,
            iterations_per_column: 20,
            min_iterations: 200,
            max_iterations: 200_000,
            violation_tolerance: 1e-6,
            zero_reduced_cost_tolerance: 1e-9,
            objective_norm_limit: 1 << 40,
            random_seed: 42,
        }
    }
}
