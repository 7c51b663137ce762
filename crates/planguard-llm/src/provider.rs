//! Reasoning service trait

use crate::types::{GenerateRequest, RepairRequest};
use serde_json::Value;
use std::time::Duration;

/// Result type for reasoner calls
pub type ReasonerResult<T> = Result<T, ReasonerError>;

/// Reasoner failures. Every variant is transient from the repair loop's
/// point of view: it consumes one attempt and the loop moves on.
#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Produces and corrects plans.
///
/// Both calls return raw plan JSON; parsing and validation happen on the
/// caller's side.
#[async_trait::async_trait]
pub trait PlanReasoner: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> ReasonerResult<Value>;

    async fn repair(&self, request: RepairRequest) -> ReasonerResult<Value>;
}
