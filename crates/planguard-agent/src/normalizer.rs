//! Plan normalization: rewrite legacy output shorthand into the strict form

use planguard_core::{DataType, OutputSpec, Plan, Step, StepOutput};
use planguard_plugins::PluginCatalog;

/// Rewrite every bare-string output to `{description, type: "string"}`.
///
/// Inputs are left alone; a scalar input is a defect, not shorthand.
pub fn normalize(plan: Plan) -> Plan {
    normalize_steps(plan, |_, _| None)
}

/// Like [`normalize`], but takes the output type from the step's plugin
/// definition when the registry declares one.
pub fn normalize_with(plan: Plan, catalog: &PluginCatalog) -> Plan {
    normalize_steps(plan, |step, output| {
        catalog
            .lookup(&step.action_verb)
            .and_then(|def| def.output(output))
            .map(|def| def.data_type)
    })
}

fn normalize_steps(mut plan: Plan, infer: impl Fn(&Step, &str) -> Option<DataType>) -> Plan {
    for step in &mut plan.steps {
        let view: &Step = step;
        let legacy: Vec<(String, OutputSpec)> = view
            .outputs
            .iter()
            .filter_map(|(name, out)| match out {
                StepOutput::Legacy(description) => {
                    let data_type = infer(view, name).unwrap_or(DataType::String);
                    Some((name.clone(), OutputSpec::new(description.clone(), data_type)))
                }
                StepOutput::Spec(_) | StepOutput::Malformed(_) => None,
            })
            .collect();

        // insert on an existing key keeps its position
        for (name, spec) in legacy {
            step.outputs.insert(name, StepOutput::Spec(spec));
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_core::PluginDefinition;
    use serde_json::json;

    #[test]
    fn legacy_output_type_comes_from_registry() {
        let plan = Plan::from_value(json!([{
            "number": 1,
            "actionVerb": "SEARCH",
            "outputs": {"results": "links found", "note": "free text"}
        }]))
        .unwrap();
        let catalog = PluginCatalog::from_definitions(vec![
            PluginDefinition::new("SEARCH").with_output("results", DataType::Array)
        ]);
        let plan = normalize_with(plan, &catalog);
        let outputs = &plan.steps[0].outputs;
        assert_eq!(outputs["results"], StepOutput::Spec(OutputSpec::new("links found", DataType::Array)));
        assert_eq!(outputs["note"], StepOutput::Spec(OutputSpec::new("free text", DataType::String)));
    }
}
