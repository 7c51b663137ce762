//! Planguard Plugins - registry adapter and the builtin control verbs
//!
//! The registry itself lives elsewhere. This crate only turns whatever it
//! lists into an immutable [`PluginCatalog`] snapshot that validation and
//! iteration analysis read from.

pub mod builtin;
pub mod registry;

pub use builtin::{
    foreach_definition, is_iteration_verb, ARRAY_INPUT, FOREACH_VERB, INDEX_OUTPUT, ITEM_OUTPUT,
};
pub use registry::{PluginCatalog, PluginRegistry, StaticRegistry};
