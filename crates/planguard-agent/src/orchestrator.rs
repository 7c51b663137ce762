//! Plan orchestrator: request in, plugin-style output envelope out

use crate::context::RequestContext;
use crate::repair::{RepairConfig, RepairCoordinator};
use planguard_core::{PlanRequest, PluginOutput};
use planguard_llm::{GenerateRequest, PlanReasoner, ReasonerError};
use planguard_plugins::PluginCatalog;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PlanOrchestrator {
    reasoner: Arc<dyn PlanReasoner>,
    config: RepairConfig,
}

impl PlanOrchestrator {
    pub fn new(reasoner: Arc<dyn PlanReasoner>) -> Self {
        Self {
            reasoner,
            config: RepairConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one request given as a `[key, value]` pair list.
    ///
    /// Always yields a single envelope; failures come back as
    /// `{success: false, error}`.
    pub async fn execute(&self, inputs: &Value, ctx: &RequestContext) -> Vec<PluginOutput> {
        let request = match PlanRequest::from_pairs(inputs) {
            Ok(request) => request,
            Err(e) => {
                warn!(run_id = %ctx.run_id, error = %e, "malformed request");
                return vec![PluginOutput::error(format!("Invalid request: {}", e))];
            }
        };
        vec![self.execute_request(request, ctx).await]
    }

    pub async fn execute_request(&self, request: PlanRequest, ctx: &RequestContext) -> PluginOutput {
        let hints = request.service_hints.clone().over(&ctx.service_hints);
        let mut ctx = ctx.clone().with_service_hints(hints);
        if let Some(token) = &request.auth_token {
            ctx = ctx.with_auth_token(token.clone());
        }

        info!(
            run_id = %ctx.run_id,
            goal = %request.goal,
            plugins = request.available_plugins.len(),
            has_plan = request.plan.is_some(),
            "planning request"
        );

        let raw = match request.plan {
            Some(plan) => plan,
            None => {
                let generate = GenerateRequest::new(&request.goal, request.available_plugins.clone())
                    .with_context(ctx.call_context());
                let reply = tokio::time::timeout(self.config.call_timeout, self.reasoner.generate(generate))
                    .await
                    .unwrap_or(Err(ReasonerError::Timeout(self.config.call_timeout)));
                match reply {
                    Ok(plan) => plan,
                    Err(e) => {
                        // an empty plan sends the whole job through the repair budget
                        warn!(run_id = %ctx.run_id, error = %e, "plan generation failed");
                        Value::Array(Vec::new())
                    }
                }
            }
        };

        let catalog = Arc::new(PluginCatalog::from_definitions(request.available_plugins));
        let coordinator = RepairCoordinator::new(self.reasoner.clone(), catalog)
            .with_config(self.config.clone());

        match coordinator.validate_and_repair(raw, &request.goal, &ctx).await {
            Ok(repaired) => {
                let steps = repaired.plan.len();
                PluginOutput::plan(repaired.plan.to_value())
                    .with_description(format!("Validated plan with {} steps", steps))
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, error = %e, "planning failed");
                PluginOutput::error(e.to_string())
            }
        }
    }
}
