//! The bridge between the exact-integer problem and the external
//! floating-point LP solver.

mod interface;
mod scaling;
mod solve_cycle;

pub use interface::BasisToken;
pub use interface::LpColIndex;
pub use interface::LpConstraintStatus;
pub use interface::LpRowIndex;
pub use interface::LpSolver;
pub use interface::LpStatus;
pub use scaling::ScalingBridge;
pub(crate) use solve_cycle::CycleOutcome;
pub(crate) use solve_cycle::SolveCycle;
