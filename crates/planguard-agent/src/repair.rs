//! Repair loop: normalize, resolve iteration, validate, and negotiate fixes
//! with the reasoner until the plan is valid or the retry budget runs out.

use crate::context::RequestContext;
use crate::iteration::resolve_iteration;
use crate::normalizer::normalize_with;
use crate::validator::validate;
use chrono::{DateTime, Utc};
use planguard_core::{Plan, ValidationResult};
use planguard_llm::{PlanReasoner, ReasonerError, RepairRequest};
use planguard_plugins::PluginCatalog;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct RepairConfig {
    /// Reasoner round-trips allowed after the first validation.
    pub max_retries: u32,
    /// Upper bound on a single reasoner call.
    pub call_timeout: Duration,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RepairConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Valid,
    Invalid,
    CallFailed(String),
    TimedOut,
}

/// One pass through validation. Attempt 0 is the plan as received.
#[derive(Clone, Debug, Serialize)]
pub struct RepairAttempt {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub errors: Vec<String>,
    pub at: DateTime<Utc>,
}

impl RepairAttempt {
    fn new(attempt: u32, outcome: AttemptOutcome, errors: Vec<String>) -> Self {
        Self {
            attempt,
            outcome,
            errors,
            at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RepairedPlan {
    pub plan: Plan,
    pub attempts: Vec<RepairAttempt>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("plan repair failed after {attempts} attempts: {}", .last_errors.join("; "))]
    Exhausted {
        attempts: u32,
        last_errors: Vec<String>,
        history: Vec<RepairAttempt>,
    },

    #[error("plan repair cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// A plan after one normalize/resolve/validate pass.
struct Checked {
    /// What the reasoner gets to see next: the resolved plan, or the raw
    /// payload when it could not be parsed.
    payload: Value,
    plan: Option<Plan>,
    result: ValidationResult,
}

pub struct RepairCoordinator {
    reasoner: Arc<dyn PlanReasoner>,
    catalog: Arc<PluginCatalog>,
    config: RepairConfig,
}

impl RepairCoordinator {
    pub fn new(reasoner: Arc<dyn PlanReasoner>, catalog: Arc<PluginCatalog>) -> Self {
        Self {
            reasoner,
            catalog,
            config: RepairConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn check(&self, raw: Value) -> Checked {
        match Plan::from_value(raw.clone()) {
            Ok(plan) => {
                let plan = resolve_iteration(normalize_with(plan, &self.catalog), &self.catalog);
                let result = validate(&plan, &self.catalog);
                Checked {
                    payload: plan.to_value(),
                    plan: Some(plan),
                    result,
                }
            }
            Err(e) => Checked {
                payload: raw,
                plan: None,
                result: ValidationResult::from_errors(e.findings()),
            },
        }
    }

    /// Return a valid plan derived from `raw`, calling the reasoner for fixes
    /// at most `max_retries` times.
    pub async fn validate_and_repair(
        &self,
        raw: Value,
        goal: &str,
        ctx: &RequestContext,
    ) -> Result<RepairedPlan, RepairError> {
        let span = info_span!("plan_repair", run_id = %ctx.run_id, goal = %goal);
        self.run(raw, goal, ctx).instrument(span).await
    }

    async fn run(
        &self,
        raw: Value,
        goal: &str,
        ctx: &RequestContext,
    ) -> Result<RepairedPlan, RepairError> {
        let mut history = Vec::new();
        let checked = self.check(raw);
        let mut last_errors = checked.result.errors.clone();
        let mut payload = checked.payload.clone();

        if let Some(plan) = accept(checked, 0, &mut history) {
            info!(steps = plan.len(), "plan valid as received");
            return Ok(RepairedPlan {
                plan,
                attempts: history,
            });
        }

        let max_retries = self.config.max_retries;
        info!(errors = last_errors.len(), max_retries, "plan invalid, starting repair");

        for attempt in 1..=max_retries {
            if ctx.is_cancelled() {
                info!(attempt, "repair cancelled");
                return Err(RepairError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            let request = RepairRequest::new(goal, payload.clone(), last_errors.clone())
                .with_plugins(self.catalog.definitions().cloned().collect())
                .with_attempt(attempt)
                .with_context(ctx.call_context());

            debug!(attempt, reasoner = self.reasoner.name(), "requesting repair");
            let reply = tokio::time::timeout(self.config.call_timeout, self.reasoner.repair(request))
                .await
                .unwrap_or(Err(ReasonerError::Timeout(self.config.call_timeout)));

            let candidate = match reply {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(attempt, error = %e, "repair call failed");
                    let outcome = match e {
                        ReasonerError::Timeout(_) => AttemptOutcome::TimedOut,
                        other => AttemptOutcome::CallFailed(other.to_string()),
                    };
                    history.push(RepairAttempt::new(attempt, outcome, last_errors.clone()));
                    continue;
                }
            };

            let checked = self.check(candidate);
            let errors = checked.result.errors.clone();
            let next_payload = checked.payload.clone();
            if let Some(plan) = accept(checked, attempt, &mut history) {
                info!(attempt, steps = plan.len(), "plan repaired");
                return Ok(RepairedPlan {
                    plan,
                    attempts: history,
                });
            }
            warn!(attempt, errors = errors.len(), "repaired plan still invalid");
            last_errors = errors;
            payload = next_payload;
        }

        warn!(attempts = max_retries, "repair budget exhausted");
        Err(RepairError::Exhausted {
            attempts: max_retries,
            last_errors,
            history,
        })
    }
}

/// Record a validation pass; hand back the plan when it passed.
fn accept(checked: Checked, attempt: u32, history: &mut Vec<RepairAttempt>) -> Option<Plan> {
    if checked.result.valid {
        history.push(RepairAttempt::new(attempt, AttemptOutcome::Valid, Vec::new()));
        checked.plan
    } else {
        history.push(RepairAttempt::new(
            attempt,
            AttemptOutcome::Invalid,
            checked.result.errors,
        ));
        None
    }
}
