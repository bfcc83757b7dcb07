//! Cooperative termination of long-running work.
//!
//! The solve cycle and the cut heuristics consult a [`TerminationCondition`]
//! before and inside their long loops; a partially built cut is simply
//! discarded when the condition triggers.

use std::time::Duration;
use std::time::Instant;

/// A condition which is polled to determine whether the propagator should stop early.
pub trait TerminationCondition {
    /// Returns `true` when the budget is exhausted and work should be abandoned cleanly.
    fn should_stop(&mut self) -> bool;
}

/// A [`TerminationCondition`] which never triggers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// A [`TerminationCondition`] which triggers when the specified time budget has been exceeded.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    /// The point in time from which to measure the budget.
    started_at: Instant,
    /// The amount of time before [`TimeBudget::should_stop()`] becomes true.
    budget: Duration,
}

impl TimeBudget {
    /// Give the propagator a time budget, starting now.
    pub fn starting_now(budget: Duration) -> TimeBudget {
        let started_at = Instant::now();

        TimeBudget { started_at, budget }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        self.started_at.elapsed() >= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_stops_immediately() {
        let mut budget = TimeBudget::starting_now(Duration::ZERO);
        assert!(budget.should_stop());
    }

    #[test]
    fn indefinite_never_stops() {
        assert!(!Indefinite.should_stop());
    }
}
