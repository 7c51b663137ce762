//! Planguard Agent - plan normalization, validation, iteration repair and the repair loop

pub mod context;
pub mod iteration;
pub mod normalizer;
pub mod orchestrator;
pub mod repair;
pub mod validator;

pub use context::RequestContext;
pub use iteration::{find_mismatches, resolve_iteration, CardinalityMismatch};
pub use normalizer::{normalize, normalize_with};
pub use orchestrator::PlanOrchestrator;
pub use repair::{
    AttemptOutcome, RepairAttempt, RepairConfig, RepairCoordinator, RepairError, RepairedPlan,
};
pub use validator::validate;
