//! Planguard LLM - reasoning service seam, HTTP client, prompts and reply parsing

pub mod brain;
pub mod extract;
pub mod prompt;
pub mod provider;
pub mod types;

pub use brain::BrainClient;
pub use extract::extract_plan;
pub use provider::{PlanReasoner, ReasonerError, ReasonerResult};
pub use types::*;
