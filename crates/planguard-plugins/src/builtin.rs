//! Control verbs the engine inserts on its own

use planguard_core::{DataType, PluginDefinition};

pub const FOREACH_VERB: &str = "FOREACH";

/// Input of an iteration step holding the array to walk.
pub const ARRAY_INPUT: &str = "array";
/// Per-element output of an iteration step.
pub const ITEM_OUTPUT: &str = "item";
/// Zero-based position of the current element.
pub const INDEX_OUTPUT: &str = "index";

pub fn foreach_definition() -> PluginDefinition {
    PluginDefinition::new(FOREACH_VERB)
        .with_description("Run the downstream steps once for each element of an array")
        .with_input(ARRAY_INPUT, DataType::Array, true)
        .with_output(ITEM_OUTPUT, DataType::Any)
        .with_output(INDEX_OUTPUT, DataType::Number)
}

pub fn is_iteration_verb(verb: &str) -> bool {
    verb.eq_ignore_ascii_case(FOREACH_VERB)
}

pub(crate) fn builtin_definitions() -> Vec<PluginDefinition> {
    vec![foreach_definition()]
}
