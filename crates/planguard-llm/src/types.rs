//! Request and wire types for the reasoning service

use planguard_core::PluginDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call credentials and routing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    pub auth_token: Option<String>,
    /// Overrides the client's configured base URL for this call.
    pub brain_url: Option<String>,
}

/// Ask for a fresh plan.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub goal: String,
    pub plugins: Vec<PluginDefinition>,
    pub context: CallContext,
}

impl GenerateRequest {
    pub fn new(goal: impl Into<String>, plugins: Vec<PluginDefinition>) -> Self {
        Self {
            goal: goal.into(),
            plugins,
            context: CallContext::default(),
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// Ask for a corrected plan.
#[derive(Clone, Debug)]
pub struct RepairRequest {
    pub goal: String,
    /// Current plan JSON, as last seen by the validator.
    pub plan: Value,
    /// Findings accumulated so far, newest last.
    pub errors: Vec<String>,
    pub plugins: Vec<PluginDefinition>,
    pub attempt: u32,
    pub context: CallContext,
}

impl RepairRequest {
    pub fn new(goal: impl Into<String>, plan: Value, errors: Vec<String>) -> Self {
        Self {
            goal: goal.into(),
            plan,
            errors,
            plugins: Vec::new(),
            attempt: 1,
            context: CallContext::default(),
        }
    }

    pub fn with_plugins(mut self, plugins: Vec<PluginDefinition>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// One turn sent to the brain service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub role: String,
    pub content: String,
}

impl Exchange {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub exchanges: Vec<Exchange>,
    pub optimization: String,
    #[serde(rename = "responseType", default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
}

/// Reply of `POST /chat`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(alias = "result", default)]
    pub response: Value,
}
