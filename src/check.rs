//! Offline plan check: the repair pipeline without the reasoner

use planguard_agent::{normalize_with, resolve_iteration, validate};
use planguard_core::{Plan, PluginDefinition, ValidationResult};
use planguard_plugins::PluginCatalog;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub result: ValidationResult,
    /// The normalized and iteration-resolved plan, when it parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
}

/// Normalize, resolve iteration and validate `raw` against `plugins`.
pub fn check_plan(raw: Value, plugins: Vec<PluginDefinition>) -> CheckReport {
    let catalog = PluginCatalog::from_definitions(plugins);
    match Plan::from_value(raw) {
        Ok(plan) => {
            let plan = resolve_iteration(normalize_with(plan, &catalog), &catalog);
            CheckReport {
                result: validate(&plan, &catalog),
                plan: Some(plan.to_value()),
            }
        }
        Err(e) => CheckReport {
            result: ValidationResult::from_errors(e.findings()),
            plan: None,
        },
    }
}
