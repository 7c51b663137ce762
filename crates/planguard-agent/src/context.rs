//! Request-scoped context threaded through one orchestrator call

use planguard_core::ServiceHints;
use planguard_llm::CallContext;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything one invocation carries that is not part of the plan itself.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub run_id: Uuid,
    pub auth_token: Option<String>,
    pub service_hints: ServiceHints,
    pub cancel: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            auth_token: None,
            service_hints: ServiceHints::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_service_hints(mut self, hints: ServiceHints) -> Self {
        self.service_hints = hints;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Credentials and routing for reasoner calls made on behalf of this request.
    pub fn call_context(&self) -> CallContext {
        CallContext {
            auth_token: self.auth_token.clone(),
            brain_url: self.service_hints.brain_url.clone(),
        }
    }
}
