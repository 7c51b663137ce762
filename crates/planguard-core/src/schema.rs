//! Plugin schemas as supplied by the registry

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Closed set of value types a plugin input or output may declare.
///
/// Names are read case-insensitively and accept a few common aliases
/// (`integer`, `list`, `dict`, ...).
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Array,
    Object,
    Plan,
    Plugin,
    Any,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::Plan => "plan",
            DataType::Plugin => "plugin",
            DataType::Any => "any",
        }
    }

    /// Whether a value of this type is a sequence of elements.
    ///
    /// `plan` is a sequence of steps but is consumed whole, never iterated.
    pub fn is_array(&self) -> bool {
        matches!(self, DataType::Array)
    }

    /// Whether a consumer of this type expects a single element.
    ///
    /// `any` and `plan` accept a whole array, so they never trigger iteration.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, DataType::Array | DataType::Any | DataType::Plan)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(DataType::String),
            "number" | "integer" | "float" => Ok(DataType::Number),
            "boolean" | "bool" => Ok(DataType::Boolean),
            "array" | "list" => Ok(DataType::Array),
            "object" | "dict" | "json" => Ok(DataType::Object),
            "plan" => Ok(DataType::Plan),
            "plugin" => Ok(DataType::Plugin),
            "any" => Ok(DataType::Any),
            _ => Err(format!("unknown data type: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// One declared input of a plugin.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// One declared output of a plugin.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Schema of a capability, keyed by its action verb.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinition {
    #[serde(alias = "actionVerb")]
    pub verb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_definitions: Vec<InputDefinition>,
    #[serde(default)]
    pub output_definitions: Vec<OutputDefinition>,
}

impl PluginDefinition {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            description: None,
            input_definitions: Vec::new(),
            output_definitions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, data_type: DataType, required: bool) -> Self {
        self.input_definitions.push(InputDefinition {
            name: name.into(),
            data_type,
            required,
            description: String::new(),
        });
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.output_definitions.push(OutputDefinition {
            name: name.into(),
            data_type,
            description: String::new(),
        });
        self
    }

    pub fn input(&self, name: &str) -> Option<&InputDefinition> {
        self.input_definitions.iter().find(|d| d.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&OutputDefinition> {
        self.output_definitions.iter().find(|d| d.name == name)
    }

    /// Required inputs, in declaration order.
    pub fn required_inputs(&self) -> impl Iterator<Item = &InputDefinition> {
        self.input_definitions.iter().filter(|d| d.required)
    }
}
