//! Prompt construction for plan generation and repair

use crate::types::{GenerateRequest, RepairRequest};
use planguard_core::PluginDefinition;
use std::fmt::Write;

/// Schema rules every produced plan must follow.
pub const PLAN_SCHEMA_RULES: &str = r#"Respond with a JSON array of steps and nothing else.
Each step is an object:
  {"number": <int>, "actionVerb": <string>, "description": <string>,
   "inputs": {<name>: <binding>}, "outputs": {<name>: {"description": <string>, "type": <type>}},
   "recommendedRole": <string, optional>}
A binding is exactly one of:
  {"value": <literal>, "valueType": <type>}
  {"sourceStep": <number of an earlier step>, "outputName": <output declared by that step>}
No other keys are allowed in a binding. Use "sourceStep": 0 for values supplied by the parent context.
Types: string, number, boolean, array, object, plan, plugin, any.
Every required input of a verb must be bound. Step numbers start at 1 and are unique."#;

pub const SYSTEM_PROMPT: &str =
    "You are a planning engine. You turn goals into executable step plans for a plugin runtime.";

/// One line per verb: name, description, inputs (required marked `*`), outputs.
pub fn catalog_summary(plugins: &[PluginDefinition]) -> String {
    let mut out = String::new();
    for def in plugins {
        let inputs: Vec<String> = def
            .input_definitions
            .iter()
            .map(|d| {
                let marker = if d.required { "*" } else { "" };
                format!("{}{}: {}", d.name, marker, d.data_type)
            })
            .collect();
        let outputs: Vec<String> = def
            .output_definitions
            .iter()
            .map(|d| format!("{}: {}", d.name, d.data_type))
            .collect();
        let _ = write!(out, "- {}", def.verb);
        if let Some(desc) = def.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, " ({})", desc);
        }
        let _ = writeln!(
            out,
            " inputs [{}] outputs [{}]",
            inputs.join(", "),
            outputs.join(", ")
        );
    }
    out
}

pub fn generate_prompt(request: &GenerateRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", request.goal);
    if !request.plugins.is_empty() {
        let _ = writeln!(out, "\nAvailable plugins:\n{}", catalog_summary(&request.plugins));
    }
    let _ = writeln!(out, "\n{}", PLAN_SCHEMA_RULES);
    out
}

pub fn repair_prompt(request: &RepairRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", request.goal);
    let _ = writeln!(
        out,
        "\nThe plan below failed validation (repair attempt {}). Fix every error and return the complete corrected plan.",
        request.attempt
    );
    let _ = writeln!(out, "\nErrors:");
    for (i, err) in request.errors.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, err);
    }
    let plan = serde_json::to_string_pretty(&request.plan).unwrap_or_else(|_| request.plan.to_string());
    let _ = writeln!(out, "\nCurrent plan:\n{}", plan);
    if !request.plugins.is_empty() {
        let _ = writeln!(out, "\nAvailable plugins:\n{}", catalog_summary(&request.plugins));
    }
    let _ = writeln!(out, "\n{}", PLAN_SCHEMA_RULES);
    out
}
