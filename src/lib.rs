//! A propagator coupling a continuous LP relaxation to branch-and-bound
//! integer search.
//!
//! The propagator maintains a linear relaxation over a chosen subset of the
//! integer decision variables, resolves it whenever their bounds change, and
//! reconciles the solver's floating-point answers with bit-exact integer
//! reasoning: dual values and infeasibility rays are scaled into
//! overflow-checked integer row combinations before any deduction or conflict
//! reaches the search. At the root of the search tree a family of cut
//! generators (objective, aggregated rounding, Gomory, zero-half, cover cuts)
//! tightens the relaxation between solves.
//!
//! The external simplex solver is consumed as a black box through
//! [`lp::LpSolver`]; the search engine integrates through
//! [`propagation::SearchTrail`] and
//! [`propagation::ConstraintManager`].

pub mod accumulator;
#[doc(hidden)]
pub mod asserts;
pub mod basic_types;
pub mod containers;
pub(crate) mod cuts;
pub mod lp;
pub(crate) mod math;
pub mod options;
pub mod propagation;
pub(crate) mod reasoner;
pub mod rows;
pub mod statistics;
pub mod termination;

#[cfg(test)]
pub(crate) mod test_harness;
