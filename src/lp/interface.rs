//! The black-box interface of the external LP solver.

/// Column index in the external LP model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LpColIndex(pub u32);

/// Row index in the external LP model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LpRowIndex(pub u32);

/// The status reported by the external solver after a solve.
///
/// Only [`LpStatus::Optimal`] proves the primal solution and may be cached.
/// [`LpStatus::DualFeasible`] proves its dual values, and thereby an
/// objective bound, but nothing about the primal point; any weaker status
/// leaves the previously cached solution untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpStatus {
    /// Proven primal/dual optimal.
    Optimal,
    /// Dual-feasible but stopped before proven optimality; the duals bound the objective.
    DualFeasible,
    /// The relaxation is infeasible (dual-unbounded); an infeasibility ray is available.
    Infeasible,
    /// The iteration budget was exhausted before a proven status was reached.
    IterationLimit,
    /// The solver gave up for numerical reasons.
    NumericalError,
}

/// Basis status of one LP constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpConstraintStatus {
    Basic,
    AtLowerBound,
    AtUpperBound,
}

/// An opaque warm-start token saved after one solve and restored before the
/// next. Write-once/read-once per solve; no cross-version compatibility.
#[derive(Clone, Debug)]
pub struct BasisToken(Box<[u8]>);

impl BasisToken {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> BasisToken {
        BasisToken(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The external LP solver, consumed as a black box.
///
/// Model mutation is incremental: columns and constraints are appended, and
/// only bounds change afterwards. All values cross this interface in the
/// solver's (scaled) units; the [`ScalingBridge`](super::ScalingBridge)
/// converts to and from the exact problem's units.
pub trait LpSolver {
    fn add_variable(&mut self, lower: f64, upper: f64, objective: f64) -> LpColIndex;

    fn add_constraint(&mut self, terms: &[(LpColIndex, f64)], lower: f64, upper: f64)
        -> LpRowIndex;

    fn set_variable_bounds(&mut self, column: LpColIndex, lower: f64, upper: f64);

    fn set_constraint_bounds(&mut self, row: LpRowIndex, lower: f64, upper: f64);

    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    fn solve(&mut self, iteration_limit: u64) -> LpStatus;

    fn objective_value(&self) -> f64;

    fn variable_value(&self, column: LpColIndex) -> f64;

    fn reduced_cost(&self, column: LpColIndex) -> f64;

    fn dual_value(&self, row: LpRowIndex) -> f64;

    fn constraint_activity(&self, row: LpRowIndex) -> f64;

    fn constraint_status(&self, row: LpRowIndex) -> LpConstraintStatus;

    fn is_basic(&self, column: LpColIndex) -> bool;

    /// The row multipliers expressing the given basic column in terms of the
    /// constraint rows; consumed by the Gomory cut generator.
    fn basis_row_multipliers(&self, column: LpColIndex) -> Vec<(LpRowIndex, f64)>;

    /// The dual ray proving infeasibility; valid after [`LpStatus::Infeasible`].
    fn infeasibility_ray(&self) -> Vec<(LpRowIndex, f64)>;

    fn save_basis(&self) -> Option<BasisToken>;

    fn restore_basis(&mut self, token: &BasisToken);
}
