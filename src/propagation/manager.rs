//! The collaborator owning the pool of derived constraints.
//!
//! Cut generators submit candidate rows here; the manager decides which of
//! them enter the active LP. The propagator then drains the accepted rows and
//! attaches them to its row store before re-solving.

use log::trace;

use crate::propagation::VariableId;

/// An integer inequality `lower_bound <= sum coeff * var <= upper_bound`
/// proposed by a cut generator, expressed over variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedRow {
    pub terms: Vec<(VariableId, i64)>,
    pub lower_bound: i64,
    pub upper_bound: i64,
}

/// Information a manager may use to rank competing cuts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutDiagnostics {
    /// By how much the cut is violated at the LP solution it was derived from.
    pub violation: f64,
}

pub trait ConstraintManager {
    /// Marks the start of one propagation call; per-call bookkeeping such as
    /// duplicate filters resets here.
    fn start_call(&mut self) {}

    /// Offers a cut to the manager. Returns whether it was accepted into the
    /// active set.
    fn add_cut(&mut self, row: DerivedRow, name: &str, diagnostics: CutDiagnostics) -> bool;

    /// Hands over the rows accepted since the last drain.
    fn drain_accepted(&mut self) -> Vec<DerivedRow>;
}

/// A manager that accepts every structurally useful cut, deduplicating exact
/// repeats within one propagation call.
#[derive(Debug, Default)]
pub struct SimpleConstraintManager {
    accepted: Vec<DerivedRow>,
    seen_this_call: Vec<DerivedRow>,
}

impl ConstraintManager for SimpleConstraintManager {
    fn start_call(&mut self) {
        self.seen_this_call.clear();
    }

    fn add_cut(&mut self, row: DerivedRow, name: &str, diagnostics: CutDiagnostics) -> bool {
        if row.terms.is_empty() {
            return false;
        }
        if self.seen_this_call.contains(&row) {
            return false;
        }
        trace!(
            "accepted {name} cut with {} terms, violation {:.3e}",
            row.terms.len(),
            diagnostics.violation
        );
        self.seen_this_call.push(row.clone());
        self.accepted.push(row);
        true
    }

    fn drain_accepted(&mut self) -> Vec<DerivedRow> {
        std::mem::take(&mut self.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(coefficient: i64) -> DerivedRow {
        DerivedRow {
            terms: vec![(VariableId(0), coefficient)],
            lower_bound: i64::MIN,
            upper_bound: 3,
        }
    }

    #[test]
    fn duplicate_cuts_are_rejected_within_a_call() {
        let mut manager = SimpleConstraintManager::default();
        let diagnostics = CutDiagnostics { violation: 0.5 };
        assert!(manager.add_cut(row(1), "test", diagnostics));
        assert!(!manager.add_cut(row(1), "test", diagnostics));
        assert!(manager.add_cut(row(2), "test", diagnostics));
        assert_eq!(manager.drain_accepted().len(), 2);
        assert!(manager.drain_accepted().is_empty());
    }

    #[test]
    fn the_duplicate_filter_resets_at_call_boundaries() {
        let mut manager = SimpleConstraintManager::default();
        let diagnostics = CutDiagnostics { violation: 0.5 };
        manager.start_call();
        assert!(manager.add_cut(row(1), "test", diagnostics));
        assert!(!manager.add_cut(row(1), "test", diagnostics));
        assert_eq!(manager.drain_accepted().len(), 1);

        // The same cut may be offered again on the next call.
        manager.start_call();
        assert!(manager.add_cut(row(1), "test", diagnostics));
        assert_eq!(manager.drain_accepted().len(), 1);
    }

    #[test]
    fn empty_rows_are_rejected() {
        let mut manager = SimpleConstraintManager::default();
        let empty = DerivedRow {
            terms: Vec::new(),
            lower_bound: 0,
            upper_bound: 0,
        };
        assert!(!manager.add_cut(empty, "test", CutDiagnostics { violation: 1.0 }));
    }
}
