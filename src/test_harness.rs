//! Shared doubles for exercising the propagator without a real simplex.

use crate::lp::BasisToken;
use crate::lp::LpColIndex;
use crate::lp::LpConstraintStatus;
use crate::lp::LpRowIndex;
use crate::lp::LpSolver;
use crate::lp::LpStatus;
use crate::propagation::Bound;
use crate::propagation::BoundDirection;
use crate::propagation::SearchTrail;
use crate::propagation::VariableId;

/// A search-trail double that applies enqueued bounds to its own domain and
/// records conflicts.
#[derive(Debug)]
pub(crate) struct TestTrail {
    pub(crate) bounds: Vec<(i64, i64)>,
    pub(crate) decision_level: usize,
    pub(crate) enqueued: Vec<(Bound, Vec<Bound>)>,
    pub(crate) conflicts: Vec<Vec<Bound>>,
}

impl TestTrail {
    pub(crate) fn new(bounds: &[(i64, i64)]) -> TestTrail {
        TestTrail {
            bounds: bounds.to_vec(),
            decision_level: 0,
            enqueued: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

impl SearchTrail for TestTrail {
    fn lower_bound(&self, variable: VariableId) -> i64 {
        self.bounds[variable.0 as usize].0
    }

    fn upper_bound(&self, variable: VariableId) -> i64 {
        self.bounds[variable.0 as usize].1
    }

    fn decision_level(&self) -> usize {
        self.decision_level
    }

    fn enqueue(&mut self, bound: Bound, reasons: Vec<Bound>) -> bool {
        self.enqueued.push((bound, reasons));
        let entry = &mut self.bounds[bound.variable.0 as usize];
        match bound.direction {
            BoundDirection::Lower => entry.0 = entry.0.max(bound.value),
            BoundDirection::Upper => entry.1 = entry.1.min(bound.value),
        }
        entry.0 <= entry.1
    }

    fn report_conflict(&mut self, reasons: Vec<Bound>) {
        self.conflicts.push(reasons);
    }
}

#[derive(Debug)]
struct NaiveColumn {
    lower: f64,
    upper: f64,
    objective: f64,
}

#[derive(Debug)]
struct NaiveRow {
    terms: Vec<(LpColIndex, f64)>,
    lower: f64,
    upper: f64,
}

/// A solver double that places every variable at its objective-favoured
/// bound. If that point satisfies all constraints the solve is optimal with
/// zero duals and reduced costs equal to the objective coefficients;
/// otherwise the solve gives up with an iteration limit.
#[derive(Debug, Default)]
pub(crate) struct NaiveLp {
    columns: Vec<NaiveColumn>,
    rows: Vec<NaiveRow>,
    values: Vec<f64>,
}

impl NaiveLp {
    fn favoured_point(&self) -> Vec<f64> {
        self.columns
            .iter()
            .map(|column| {
                if column.objective >= 0.0 {
                    column.lower
                } else {
                    column.upper
                }
            })
            .collect()
    }

    fn activity(&self, row: &NaiveRow, point: &[f64]) -> f64 {
        row.terms
            .iter()
            .map(|&(column, coefficient)| coefficient * point[column.0 as usize])
            .sum()
    }
}

impl LpSolver for NaiveLp {
    fn add_variable(&mut self, lower: f64, upper: f64, objective: f64) -> LpColIndex {
        self.columns.push(NaiveColumn {
            lower,
            upper,
            objective,
        });
        LpColIndex(self.columns.len() as u32 - 1)
    }

    fn add_constraint(
        &mut self,
        terms: &[(LpColIndex, f64)],
        lower: f64,
        upper: f64,
    ) -> LpRowIndex {
        self.rows.push(NaiveRow {
            terms: terms.to_vec(),
            lower,
            upper,
        });
        LpRowIndex(self.rows.len() as u32 - 1)
    }

    fn set_variable_bounds(&mut self, column: LpColIndex, lower: f64, upper: f64) {
        self.columns[column.0 as usize].lower = lower;
        self.columns[column.0 as usize].upper = upper;
    }

    fn set_constraint_bounds(&mut self, row: LpRowIndex, lower: f64, upper: f64) {
        self.rows[row.0 as usize].lower = lower;
        self.rows[row.0 as usize].upper = upper;
    }

    fn num_variables(&self) -> usize {
        self.columns.len()
    }

    fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    fn solve(&mut self, _iteration_limit: u64) -> LpStatus {
        let point = self.favoured_point();
        let feasible = self.rows.iter().all(|row| {
            let activity = self.activity(row, &point);
            activity >= row.lower - 1e-9 && activity <= row.upper + 1e-9
        });
        if feasible {
            self.values = point;
            LpStatus::Optimal
        } else {
            LpStatus::IterationLimit
        }
    }

    fn objective_value(&self) -> f64 {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(column, &value)| column.objective * value)
            .sum()
    }

    fn variable_value(&self, column: LpColIndex) -> f64 {
        self.values[column.0 as usize]
    }

    fn reduced_cost(&self, column: LpColIndex) -> f64 {
        self.columns[column.0 as usize].objective
    }

    fn dual_value(&self, _row: LpRowIndex) -> f64 {
        0.0
    }

    fn constraint_activity(&self, row: LpRowIndex) -> f64 {
        self.activity(&self.rows[row.0 as usize], &self.values)
    }

    fn constraint_status(&self, _row: LpRowIndex) -> LpConstraintStatus {
        LpConstraintStatus::Basic
    }

    fn is_basic(&self, _column: LpColIndex) -> bool {
        false
    }

    fn basis_row_multipliers(&self, _column: LpColIndex) -> Vec<(LpRowIndex, f64)> {
        Vec::new()
    }

    fn infeasibility_ray(&self) -> Vec<(LpRowIndex, f64)> {
        Vec::new()
    }

    fn save_basis(&self) -> Option<BasisToken> {
        Some(BasisToken::new(Vec::new()))
    }

    fn restore_basis(&mut self, _token: &BasisToken) {}
}

/// A solver double with a fully scripted outcome, for exercising the
/// infeasibility paths.
#[derive(Debug, Default)]
pub(crate) struct ScriptedLp {
    /// Statuses returned by successive solves, consumed front to back.
    pub(crate) statuses: Vec<LpStatus>,
    pub(crate) ray: Vec<(LpRowIndex, f64)>,
    pub(crate) duals: Vec<f64>,
    pub(crate) values: Vec<f64>,
    pub(crate) reduced_costs: Vec<f64>,
    pub(crate) objective: f64,
    pub(crate) num_columns: usize,
    pub(crate) num_rows: usize,
}

impl LpSolver for ScriptedLp {
    fn add_variable(&mut self, _lower: f64, _upper: f64, _objective: f64) -> LpColIndex {
        self.num_columns += 1;
        LpColIndex(self.num_columns as u32 - 1)
    }

    fn add_constraint(
        &mut self,
        _terms: &[(LpColIndex, f64)],
        _lower: f64,
        _upper: f64,
    ) -> LpRowIndex {
        self.num_rows += 1;
        LpRowIndex(self.num_rows as u32 - 1)
    }

    fn set_variable_bounds(&mut self, _column: LpColIndex, _lower: f64, _upper: f64) {}

    fn set_constraint_bounds(&mut self, _row: LpRowIndex, _lower: f64, _upper: f64) {}

    fn num_variables(&self) -> usize {
        self.num_columns
    }

    fn num_constraints(&self) -> usize {
        self.num_rows
    }

    fn solve(&mut self, _iteration_limit: u64) -> LpStatus {
        if self.statuses.is_empty() {
            LpStatus::NumericalError
        } else {
            self.statuses.remove(0)
        }
    }

    fn objective_value(&self) -> f64 {
        self.objective
    }

    fn variable_value(&self, column: LpColIndex) -> f64 {
        self.values[column.0 as usize]
    }

    fn reduced_cost(&self, column: LpColIndex) -> f64 {
        self.reduced_costs[column.0 as usize]
    }

    fn dual_value(&self, row: LpRowIndex) -> f64 {
        self.duals[row.0 as usize]
    }

    fn constraint_activity(&self, _row: LpRowIndex) -> f64 {
        0.0
    }

    fn constraint_status(&self, _row: LpRowIndex) -> LpConstraintStatus {
        LpConstraintStatus::Basic
    }

    fn is_basic(&self, _column: LpColIndex) -> bool {
        false
    }

    fn basis_row_multipliers(&self, _column: LpColIndex) -> Vec<(LpRowIndex, f64)> {
        Vec::new()
    }

    fn infeasibility_ray(&self) -> Vec<(LpRowIndex, f64)> {
        self.ray.clone()
    }

    fn save_basis(&self) -> Option<BasisToken> {
        None
    }

    fn restore_basis(&mut self, _token: &BasisToken) {}
}
