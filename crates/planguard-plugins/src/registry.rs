//! Registry seam and the catalog snapshot built from it

use crate::builtin::builtin_definitions;
use planguard_core::PluginDefinition;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Source of plugin schemas.
///
/// Read once per invocation; implementations must not expect the result to be
/// mutated by the caller.
pub trait PluginRegistry: Send + Sync {
    fn list_plugin_definitions(&self) -> Vec<PluginDefinition>;
}

/// Registry backed by a fixed list, e.g. the `availablePlugins` of a request.
#[derive(Clone, Debug, Default)]
pub struct StaticRegistry {
    definitions: Vec<PluginDefinition>,
}

impl StaticRegistry {
    pub fn new(definitions: Vec<PluginDefinition>) -> Self {
        Self { definitions }
    }
}

impl PluginRegistry for StaticRegistry {
    fn list_plugin_definitions(&self) -> Vec<PluginDefinition> {
        self.definitions.clone()
    }
}

/// Immutable verb -> schema lookup.
///
/// Builtin control verbs are always present; a registry entry with the same
/// verb replaces the builtin.
#[derive(Clone, Debug, Default)]
pub struct PluginCatalog {
    definitions: Vec<Arc<PluginDefinition>>,
    by_verb: HashMap<String, usize>,
}

impl PluginCatalog {
    /// Catalog holding only the builtin control verbs.
    pub fn builtin() -> Self {
        Self::from_definitions(Vec::new())
    }

    pub fn from_registry(registry: &dyn PluginRegistry) -> Self {
        Self::from_definitions(registry.list_plugin_definitions())
    }

    pub fn from_definitions(definitions: Vec<PluginDefinition>) -> Self {
        let mut catalog = Self::default();
        for def in builtin_definitions().into_iter().chain(definitions) {
            catalog.insert(def);
        }
        debug!(plugins = catalog.len(), "plugin catalog built");
        catalog
    }

    fn insert(&mut self, def: PluginDefinition) {
        let key = def.verb.to_ascii_uppercase();
        let def = Arc::new(def);
        match self.by_verb.get(&key) {
            Some(&index) => self.definitions[index] = def,
            None => {
                self.by_verb.insert(key, self.definitions.len());
                self.definitions.push(def);
            }
        }
    }

    /// Schema for a verb. Verbs compare case-insensitively.
    pub fn lookup(&self, verb: &str) -> Option<&PluginDefinition> {
        self.by_verb
            .get(&verb.to_ascii_uppercase())
            .map(|&index| self.definitions[index].as_ref())
    }

    pub fn contains(&self, verb: &str) -> bool {
        self.lookup(verb).is_some()
    }

    /// Definitions in registration order, builtins first.
    pub fn definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.definitions.iter().map(Arc::as_ref)
    }

    pub fn verbs(&self) -> Vec<&str> {
        self.definitions().map(|d| d.verb.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl PluginRegistry for PluginCatalog {
    fn list_plugin_definitions(&self) -> Vec<PluginDefinition> {
        self.definitions().cloned().collect()
    }
}
