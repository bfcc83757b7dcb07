//! Types shared with the search engine that owns variable bounds.

use crate::containers::StorageKey;

/// Handle of an integer decision variable owned by the external search trail.
///
/// The propagator assigns each variable a stable [`ColumnIndex`](crate::rows::ColumnIndex)
/// at construction; the mapping is fixed for the lifetime of the propagator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

impl StorageKey for VariableId {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        VariableId(index as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundDirection {
    Lower,
    Upper,
}

/// A bound literal `variable >= value` or `variable <= value`.
///
/// Used both for deductions handed to the trail and for the reasons that
/// justify them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    pub variable: VariableId,
    pub direction: BoundDirection,
    pub value: i64,
}

impl Bound {
    pub fn lower(variable: VariableId, value: i64) -> Bound {
        Bound {
            variable,
            direction: BoundDirection::Lower,
            value,
        }
    }

    pub fn upper(variable: VariableId, value: i64) -> Bound {
        Bound {
            variable,
            direction: BoundDirection::Upper,
            value,
        }
    }
}

/// The reasons which justify an inconsistency detected by the propagator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conflict {
    pub reasons: Vec<Bound>,
}

/// The result of one propagation call; `Err` carries the conflict that was
/// also reported to the trail.
pub type PropagationStatus = Result<(), Conflict>;

/// The search engine collaborator owning variable bounds and decision levels.
///
/// `enqueue` returns `false` when the deduction immediately conflicts with the
/// current domain, in which case the propagator reports a conflict with the
/// accompanying reasons.
pub trait SearchTrail {
    fn lower_bound(&self, variable: VariableId) -> i64;

    fn upper_bound(&self, variable: VariableId) -> i64;

    fn is_fixed(&self, variable: VariableId) -> bool {
        self.lower_bound(variable) == self.upper_bound(variable)
    }

    fn decision_level(&self) -> usize;

    /// Applies a bound deduction. Returns `false` on conflict.
    fn enqueue(&mut self, bound: Bound, reasons: Vec<Bound>) -> bool;

    fn report_conflict(&mut self, reasons: Vec<Bound>);
}
