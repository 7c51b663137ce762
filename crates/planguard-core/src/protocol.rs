//! Orchestrator request/response protocol
//!
//! Requests arrive as an ordered list of `[key, value]` pairs. They are folded
//! into an [`InputSet`] (last write wins, first position kept) and then read
//! into a typed [`PlanRequest`].

use crate::error::RequestError;
use crate::schema::PluginDefinition;
use crate::types::json_kind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered name -> value mapping built from request pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSet {
    entries: IndexMap<String, Value>,
}

impl InputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a pair list into an input set.
    ///
    /// Each element is either `[key, value]` or `{"key"|"inputName": k, "value": v}`.
    /// Values wrapped as `{"value": x}` are unwrapped to `x`.
    pub fn from_pairs(raw: &Value) -> Result<Self, RequestError> {
        let Value::Array(pairs) = raw else {
            return Err(RequestError::NotAList);
        };

        let mut set = Self::new();
        for (index, pair) in pairs.iter().enumerate() {
            let (key, value) = split_pair(pair).ok_or(RequestError::MalformedPair { index })?;
            set.insert(key, unwrap_value(value));
        }
        Ok(set)
    }

    /// Insert a value. A repeated key overwrites in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// First present key among `keys`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.entries.get(*k))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_pair(pair: &Value) -> Option<(String, &Value)> {
    match pair {
        Value::Array(items) if items.len() == 2 => {
            let key = items[0].as_str()?;
            Some((key.to_string(), &items[1]))
        }
        Value::Object(map) => {
            let key = map
                .get("key")
                .or_else(|| map.get("inputName"))
                .and_then(Value::as_str)?;
            Some((key.to_string(), map.get("value").unwrap_or(&Value::Null)))
        }
        _ => None,
    }
}

fn unwrap_value(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key("value") => {
            map.get("value").cloned().unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

/// Service-location hints forwarded with a request.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brain_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub librarian_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_office_url: Option<String>,
}

impl ServiceHints {
    /// Field-wise merge: hints set here win, unset ones fall back to `base`.
    pub fn over(self, base: &ServiceHints) -> Self {
        Self {
            brain_url: self.brain_url.or_else(|| base.brain_url.clone()),
            librarian_url: self.librarian_url.or_else(|| base.librarian_url.clone()),
            post_office_url: self.post_office_url.or_else(|| base.post_office_url.clone()),
        }
    }
}

/// Typed view of an orchestrator request.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanRequest {
    pub goal: String,
    pub auth_token: Option<String>,
    pub available_plugins: Vec<PluginDefinition>,
    pub plan: Option<Value>,
    pub service_hints: ServiceHints,
}

impl PlanRequest {
    pub fn from_inputs(inputs: &InputSet) -> Result<Self, RequestError> {
        let goal = match inputs.get("goal") {
            None | Some(Value::Null) => return Err(RequestError::MissingGoal),
            Some(Value::String(goal)) if goal.trim().is_empty() => {
                return Err(RequestError::MissingGoal)
            }
            Some(Value::String(goal)) => goal.trim().to_string(),
            Some(other) => {
                return Err(RequestError::invalid_field(
                    "goal",
                    format!("expected a string, got {}", json_kind(other)),
                ))
            }
        };

        let auth_token = optional_string(inputs, &["authToken", "token"])?;

        let available_plugins = match inputs.get("availablePlugins") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| RequestError::invalid_field("availablePlugins", e.to_string()))?,
        };

        let plan = inputs.get("plan").filter(|v| !v.is_null()).cloned();

        let service_hints = ServiceHints {
            brain_url: optional_string(inputs, &["brainUrl"])?,
            librarian_url: optional_string(inputs, &["librarianUrl"])?,
            post_office_url: optional_string(inputs, &["postOfficeUrl"])?,
        };

        Ok(Self {
            goal,
            auth_token,
            available_plugins,
            plan,
            service_hints,
        })
    }

    /// Parse a raw pair list straight into a request.
    pub fn from_pairs(raw: &Value) -> Result<Self, RequestError> {
        Self::from_inputs(&InputSet::from_pairs(raw)?)
    }
}

fn optional_string(inputs: &InputSet, keys: &[&str]) -> Result<Option<String>, RequestError> {
    match inputs.get_any(keys) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RequestError::invalid_field(
            keys[0],
            format!("expected a string, got {}", json_kind(other)),
        )),
    }
}

/// Plugin-style result envelope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginOutput {
    pub success: bool,
    pub name: String,
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginOutput {
    pub fn plan(plan: Value) -> Self {
        Self {
            success: true,
            name: "plan".into(),
            result_type: "plan".into(),
            result: Some(plan),
            result_description: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            name: "error".into(),
            result_type: "error".into(),
            result: None,
            result_description: None,
            error: Some(message.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.result_description = Some(description.into());
        self
    }
}
