//! Error types for Planguard

use thiserror::Error;

/// A plan payload that could not be turned into steps.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected plan shape: {0}")]
    Shape(String),

    #[error("no plan found in text")]
    NotFound,

    /// One finding per step that could not be read, in plan order.
    #[error("{}", .0.join("; "))]
    Steps(Vec<String>),
}

impl PlanError {
    /// Finding text fed back into the repair loop.
    pub fn to_finding(&self) -> String {
        format!("Plan could not be parsed: {}", self)
    }

    /// Findings for the repair loop. Step-level failures keep their own
    /// step attribution.
    pub fn findings(&self) -> Vec<String> {
        match self {
            Self::Steps(findings) => findings.clone(),
            _ => vec![self.to_finding()],
        }
    }
}

/// Orchestrator request that cannot be processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("inputs must be a list of [key, value] pairs")]
    NotAList,

    #[error("input #{index} is not a [key, value] pair")]
    MalformedPair { index: usize },

    #[error("missing required input 'goal'")]
    MissingGoal,

    #[error("invalid input '{key}': {reason}")]
    InvalidField { key: String, reason: String },
}

impl RequestError {
    pub fn invalid_field(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
