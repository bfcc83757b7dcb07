//! The propagator and its collaborators on the search side.

mod domains;
mod manager;
mod propagator;

pub use domains::Bound;
pub use domains::BoundDirection;
pub use domains::Conflict;
pub use domains::PropagationStatus;
pub use domains::SearchTrail;
pub use domains::VariableId;
pub use manager::ConstraintManager;
pub use manager::CutDiagnostics;
pub use manager::DerivedRow;
pub use manager::SimpleConstraintManager;
pub use propagator::LinearRelaxationPropagator;
pub use propagator::LpSolutionCache;
pub use propagator::RelaxationStatistics;
