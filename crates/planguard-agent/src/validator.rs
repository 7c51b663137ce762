//! Structural validation of a normalized plan
//!
//! Pure and deterministic. Findings are plain strings in step order, then
//! input order, then output order; every finding is collected, nothing
//! short-circuits.

use planguard_core::{
    InputBinding, Plan, Step, StepInput, StepNumber, ValidationResult, PARENT_CONTEXT_STEP,
};
use planguard_plugins::PluginCatalog;
use tracing::debug;

pub fn validate(plan: &Plan, catalog: &PluginCatalog) -> ValidationResult {
    let mut errors = Vec::new();

    if plan.is_empty() {
        errors.push("Plan contains no steps".to_string());
        return ValidationResult::from_errors(errors);
    }

    for number in plan.duplicate_numbers() {
        errors.push(format!("Step {}: Duplicate step number", number));
    }
    if plan.step(PARENT_CONTEXT_STEP).is_some() {
        errors.push(format!(
            "Step {}: Step number must be positive",
            PARENT_CONTEXT_STEP
        ));
    }

    for (position, step) in plan.iter().enumerate() {
        for (name, input) in &step.inputs {
            match input {
                StepInput::Malformed { defects, .. } => {
                    errors.extend(defects.iter().map(|d| d.describe(step.number, name)));
                }
                StepInput::Bound(binding) => {
                    if let Some(finding) = check_reference(plan, position, step, name, binding, catalog)
                    {
                        errors.push(finding);
                    }
                }
            }
        }

        errors.extend(
            step.outputs
                .iter()
                .filter_map(|(name, output)| output.defect(step.number, name)),
        );

        if let Some(def) = catalog.lookup(&step.action_verb) {
            for required in def.required_inputs() {
                if !step.inputs.contains_key(&required.name) {
                    errors.push(format!(
                        "Step {}: Missing required input '{}' for {}",
                        step.number, required.name, step.action_verb
                    ));
                }
            }
        }
    }

    debug!(steps = plan.len(), errors = errors.len(), "plan validated");
    ValidationResult::from_errors(errors)
}

/// Resolve a reference against the steps placed before `position`.
fn check_reference(
    plan: &Plan,
    position: usize,
    step: &Step,
    name: &str,
    binding: &InputBinding,
    catalog: &PluginCatalog,
) -> Option<String> {
    let InputBinding::Reference {
        source_step,
        output_name,
        ..
    } = binding
    else {
        return None;
    };

    let source: StepNumber = match source_step {
        None => {
            return Some(format!(
                "Step {}: Input '{}' references output '{}' without a 'sourceStep'",
                step.number, name, output_name
            ))
        }
        Some(PARENT_CONTEXT_STEP) => return None,
        Some(source) => *source,
    };

    let Some(source_position) = plan.position(source) else {
        return Some(format!(
            "Step {}: Input '{}' references step {} which does not exist",
            step.number, name, source
        ));
    };

    if source == step.number || source_position >= position {
        return Some(format!(
            "Step {}: Input '{}' references step {} which does not precede it",
            step.number, name, source
        ));
    }

    let source_step = &plan.steps[source_position];
    if !declares_output(source_step, output_name, catalog) {
        return Some(format!(
            "Step {}: Input '{}' references output '{}' not declared by step {}",
            step.number, name, output_name, source
        ));
    }

    None
}

/// An output counts as declared when the step lists it or its plugin does.
fn declares_output(step: &Step, output: &str, catalog: &PluginCatalog) -> bool {
    step.outputs.contains_key(output)
        || catalog
            .lookup(&step.action_verb)
            .is_some_and(|def| def.output(output).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_core::{DataType, OutputSpec, PluginDefinition};

    #[test]
    fn parent_context_reference_is_accepted() {
        let plan = Plan::new(vec![
            Step::new(1, "ECHO").with_input("text", InputBinding::reference(0, "userInput"))
        ]);
        assert!(validate(&plan, &PluginCatalog::builtin()).valid);
    }

    #[test]
    fn output_declared_only_by_plugin_is_accepted() {
        let catalog = PluginCatalog::from_definitions(vec![
            PluginDefinition::new("SEARCH").with_output("results", DataType::Array)
        ]);
        let plan = Plan::new(vec![
            Step::new(1, "SEARCH"),
            Step::new(2, "ECHO")
                .with_input("text", InputBinding::reference(1, "results"))
                .with_output("out", OutputSpec::new("", DataType::String)),
        ]);
        assert!(validate(&plan, &catalog).valid);
    }
}
