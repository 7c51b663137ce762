//! HTTP client for the brain (reasoning) service

use crate::extract::{extract_plan, unwrap_plan};
use crate::prompt::{generate_prompt, repair_prompt, SYSTEM_PROMPT};
use crate::provider::{PlanReasoner, ReasonerError, ReasonerResult};
use crate::types::{CallContext, ChatRequest, ChatResponse, Exchange, GenerateRequest, RepairRequest};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_BRAIN_URL: &str = "http://localhost:5070";
const DEFAULT_OPTIMIZATION: &str = "accuracy";

pub struct BrainClient {
    client: Client,
    base_url: String,
    optimization: String,
    auth_token: Option<String>,
}

impl Default for BrainClient {
    fn default() -> Self {
        Self::new(DEFAULT_BRAIN_URL)
    }
}

impl BrainClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            optimization: DEFAULT_OPTIMIZATION.to_string(),
            auth_token: None,
        }
    }

    /// Transport-level timeout. The repair loop applies its own per-call
    /// timeout on top of this.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }

    pub fn with_optimization(mut self, optimization: impl Into<String>) -> Self {
        self.optimization = optimization.into();
        self
    }

    /// Token used when a call carries none of its own.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self, context: &CallContext) -> String {
        let base = context.brain_url.as_deref().unwrap_or(&self.base_url);
        format!("{}/chat", base.trim_end_matches('/'))
    }

    /// Send one prompt and return the plan JSON found in the reply.
    pub async fn ask_for_plan(&self, prompt: String, context: &CallContext) -> ReasonerResult<Value> {
        let body = ChatRequest {
            exchanges: vec![Exchange::system(SYSTEM_PROMPT), Exchange::user(prompt)],
            optimization: self.optimization.clone(),
            response_type: Some("json".into()),
        };
        let url = self.chat_url(context);

        debug!("Brain request: url={} prompt_len={}", url, body.exchanges[1].content.len());

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = context.auth_token.as_ref().or(self.auth_token.as_ref()) {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Brain error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 => ReasonerError::AuthFailed(error_text),
                429 => ReasonerError::RateLimited {
                    retry_after_ms: 60000,
                },
                _ => ReasonerError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::InvalidResponse(e.to_string()))?;

        match reply.response {
            Value::String(text) => {
                extract_plan(&text).map_err(|e| ReasonerError::InvalidResponse(e.to_string()))
            }
            Value::Null => Err(ReasonerError::InvalidResponse("empty response".into())),
            other => Ok(unwrap_plan(other)),
        }
    }
}

#[async_trait::async_trait]
impl PlanReasoner for BrainClient {
    fn name(&self) -> &str {
        "brain"
    }

    async fn generate(&self, request: GenerateRequest) -> ReasonerResult<Value> {
        let prompt = generate_prompt(&request);
        self.ask_for_plan(prompt, &request.context).await
    }

    async fn repair(&self, request: RepairRequest) -> ReasonerResult<Value> {
        let prompt = repair_prompt(&request);
        self.ask_for_plan(prompt, &request.context).await
    }
}
