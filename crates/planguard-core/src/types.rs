//! Plan data model: steps, input bindings, output specs
//!
//! Wire format of a step (camelCase JSON):
//!
//!   { "number": 2, "actionVerb": "SCRAPE", "description": "...",
//!     "inputs":  { "url": { "sourceStep": 1, "outputName": "links" } },
//!     "outputs": { "content": { "description": "...", "type": "string" } } }
//!
//! Inputs are parsed into [`StepInput`] exactly once. A well-formed entry
//! becomes an [`InputBinding`]; anything else is kept verbatim together with
//! the defects found, so the plan round-trips and the validator can report it.

use crate::error::PlanError;
use crate::schema::DataType;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub type StepNumber = u32;

/// Keys an input binding object may carry.
pub const BINDING_KEYS: [&str; 5] = ["value", "valueType", "outputName", "sourceStep", "args"];

/// `sourceStep` value that refers to the enclosing context rather than a step.
pub const PARENT_CONTEXT_STEP: StepNumber = 0;

// ---------------------------------------------------------------------------
// Input bindings
// ---------------------------------------------------------------------------

/// How a step input obtains its value.
#[derive(Clone, Debug, PartialEq)]
pub enum InputBinding {
    Literal {
        value: Value,
        value_type: String,
        args: Option<Value>,
    },
    Reference {
        source_step: Option<StepNumber>,
        output_name: String,
        args: Option<Value>,
    },
}

/// Shape defect of a raw input entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingDefect {
    NotAnObject,
    UnknownProperty(String),
    MissingValueType,
    MissingValueAndOutputName,
    MixedForms,
    InvalidField(&'static str),
}

impl BindingDefect {
    /// Human-readable finding, attributed to a step and input.
    pub fn describe(&self, step: StepNumber, input: &str) -> String {
        match self {
            Self::NotAnObject => format!("Step {}: Input '{}' must be an object", step, input),
            Self::UnknownProperty(key) => {
                format!("Step {}: Input '{}' has unknown property '{}'", step, input, key)
            }
            Self::MissingValueType => {
                format!("Step {}: Input '{}' missing 'valueType'", step, input)
            }
            Self::MissingValueAndOutputName => format!(
                "Step {}: Input '{}' missing both 'value' and 'outputName'",
                step, input
            ),
            Self::MixedForms => format!(
                "Step {}: Input '{}' cannot have both 'value' and 'outputName'",
                step, input
            ),
            Self::InvalidField(field) => {
                format!("Step {}: Input '{}' has invalid '{}'", step, input, field)
            }
        }
    }
}

impl InputBinding {
    pub fn literal(value: impl Into<Value>, value_type: DataType) -> Self {
        Self::Literal {
            value: value.into(),
            value_type: value_type.as_str().to_string(),
            args: None,
        }
    }

    pub fn reference(source_step: StepNumber, output_name: impl Into<String>) -> Self {
        Self::Reference {
            source_step: Some(source_step),
            output_name: output_name.into(),
            args: None,
        }
    }

    /// Build a binding from a raw JSON entry, collecting every shape defect.
    pub fn from_value(raw: &Value) -> Result<Self, Vec<BindingDefect>> {
        let Value::Object(map) = raw else {
            return Err(vec![BindingDefect::NotAnObject]);
        };

        let mut defects: Vec<BindingDefect> = map
            .keys()
            .filter(|k| !BINDING_KEYS.contains(&k.as_str()))
            .map(|k| BindingDefect::UnknownProperty(k.clone()))
            .collect();

        let args = map.get("args").cloned();
        let value = map.get("value");
        let output_name = map.get("outputName");

        let binding = match (value, output_name) {
            (Some(_), Some(_)) => {
                defects.push(BindingDefect::MixedForms);
                if !map.contains_key("valueType") {
                    defects.push(BindingDefect::MissingValueType);
                }
                None
            }
            (Some(value), None) => match map.get("valueType") {
                None => {
                    defects.push(BindingDefect::MissingValueType);
                    None
                }
                Some(Value::String(value_type)) => Some(Self::Literal {
                    value: value.clone(),
                    value_type: value_type.clone(),
                    args,
                }),
                Some(_) => {
                    defects.push(BindingDefect::InvalidField("valueType"));
                    None
                }
            },
            (None, Some(output_name)) => {
                let source_step = match map.get("sourceStep") {
                    None | Some(Value::Null) => Ok(None),
                    Some(raw) => parse_step_number(raw)
                        .map(Some)
                        .ok_or(BindingDefect::InvalidField("sourceStep")),
                };
                match (output_name.as_str(), source_step) {
                    (Some(name), Ok(source_step)) => Some(Self::Reference {
                        source_step,
                        output_name: name.to_string(),
                        args,
                    }),
                    (None, source_step) => {
                        defects.push(BindingDefect::InvalidField("outputName"));
                        if let Err(defect) = source_step {
                            defects.push(defect);
                        }
                        None
                    }
                    (Some(_), Err(defect)) => {
                        defects.push(defect);
                        None
                    }
                }
            }
            (None, None) => {
                defects.push(BindingDefect::MissingValueAndOutputName);
                None
            }
        };

        match binding {
            Some(binding) if defects.is_empty() => Ok(binding),
            _ => Err(defects),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::Literal {
                value,
                value_type,
                args,
            } => {
                map.insert("value".into(), value.clone());
                map.insert("valueType".into(), Value::String(value_type.clone()));
                if let Some(args) = args {
                    map.insert("args".into(), args.clone());
                }
            }
            Self::Reference {
                source_step,
                output_name,
                args,
            } => {
                if let Some(step) = source_step {
                    map.insert("sourceStep".into(), Value::from(*step));
                }
                map.insert("outputName".into(), Value::String(output_name.clone()));
                if let Some(args) = args {
                    map.insert("args".into(), args.clone());
                }
            }
        }
        Value::Object(map)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    pub fn source_step(&self) -> Option<StepNumber> {
        match self {
            Self::Reference { source_step, .. } => *source_step,
            Self::Literal { .. } => None,
        }
    }

    pub fn output_name(&self) -> Option<&str> {
        match self {
            Self::Reference { output_name, .. } => Some(output_name),
            Self::Literal { .. } => None,
        }
    }
}

fn parse_step_number(raw: &Value) -> Option<StepNumber> {
    raw.as_u64().and_then(|n| StepNumber::try_from(n).ok())
}

/// A step input as found in the plan.
#[derive(Clone, Debug, PartialEq)]
pub enum StepInput {
    Bound(InputBinding),
    Malformed {
        raw: Value,
        defects: Vec<BindingDefect>,
    },
}

impl StepInput {
    pub fn from_value(raw: Value) -> Self {
        match InputBinding::from_value(&raw) {
            Ok(binding) => Self::Bound(binding),
            Err(defects) => Self::Malformed { raw, defects },
        }
    }

    pub fn binding(&self) -> Option<&InputBinding> {
        match self {
            Self::Bound(binding) => Some(binding),
            Self::Malformed { .. } => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bound(binding) => binding.to_value(),
            Self::Malformed { raw, .. } => raw.clone(),
        }
    }
}

impl From<InputBinding> for StepInput {
    fn from(binding: InputBinding) -> Self {
        Self::Bound(binding)
    }
}

impl Serialize for StepInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StepInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Declared output of a step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputSpec {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
}

impl OutputSpec {
    pub fn new(description: impl Into<String>, data_type: DataType) -> Self {
        Self {
            description: description.into(),
            data_type,
        }
    }
}

/// Step output entry: the strict form, or a bare description from older plans.
/// Anything else, such as an unknown `type`, is kept verbatim as `Malformed`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StepOutput {
    Spec(OutputSpec),
    Legacy(String),
    Malformed(Value),
}

impl StepOutput {
    /// Declared type. Legacy entries carry none, so they read as `string`;
    /// malformed entries have no usable type.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Spec(spec) => Some(spec.data_type),
            Self::Legacy(_) => Some(DataType::String),
            Self::Malformed(_) => None,
        }
    }

    /// Finding for a malformed entry, attributed to a step and output.
    pub fn defect(&self, step: StepNumber, output: &str) -> Option<String> {
        let Self::Malformed(raw) = self else {
            return None;
        };
        Some(match raw.get("type") {
            Some(Value::String(t)) if t.parse::<DataType>().is_err() => {
                format!("Step {}: Output '{}' has unknown type '{}'", step, output, t)
            }
            Some(t) if !t.is_string() => {
                format!("Step {}: Output '{}' has invalid type {}", step, output, t)
            }
            _ => format!(
                "Step {}: Output '{}' must be a description or a {{description, type}} object",
                step, output
            ),
        })
    }
}

impl From<OutputSpec> for StepOutput {
    fn from(spec: OutputSpec) -> Self {
        Self::Spec(spec)
    }
}

// ---------------------------------------------------------------------------
// Steps and plans
// ---------------------------------------------------------------------------

/// One planned capability invocation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub number: StepNumber,
    pub action_verb: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: IndexMap<String, StepInput>,
    #[serde(default)]
    pub outputs: IndexMap<String, StepOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_role: Option<String>,
}

impl Step {
    pub fn new(number: StepNumber, action_verb: impl Into<String>) -> Self {
        Self {
            number,
            action_verb: action_verb.into(),
            description: String::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            dependencies: None,
            recommended_role: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, input: impl Into<StepInput>) -> Self {
        self.inputs.insert(name.into(), input.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, output: impl Into<StepOutput>) -> Self {
        self.outputs.insert(name.into(), output.into());
        self
    }

    /// Steps named by the `dependencies` hint, in the order they appear.
    ///
    /// Accepts a bare number, a list, `{"name": n}` maps and
    /// `{"sourceStep": n}` records, nested in any combination.
    pub fn dependency_steps(&self) -> Vec<StepNumber> {
        let mut found = Vec::new();
        if let Some(deps) = &self.dependencies {
            collect_dependency_numbers(deps, &mut found);
        }
        found
    }

    /// Rewrite every step number inside the `dependencies` hint.
    pub fn remap_dependencies(&mut self, remap: impl Fn(StepNumber) -> Option<StepNumber>) {
        if let Some(deps) = self.dependencies.as_mut() {
            remap_dependency_numbers(deps, &remap);
        }
    }
}

fn collect_dependency_numbers(value: &Value, found: &mut Vec<StepNumber>) {
    match value {
        Value::Number(_) => found.extend(parse_step_number(value)),
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_dependency_numbers(item, found)),
        Value::Object(map) => match map.get("sourceStep") {
            Some(step) => found.extend(parse_step_number(step)),
            None => map
                .values()
                .for_each(|item| collect_dependency_numbers(item, found)),
        },
        _ => {}
    }
}

fn remap_dependency_numbers(value: &mut Value, remap: &dyn Fn(StepNumber) -> Option<StepNumber>) {
    match value {
        Value::Number(_) => {
            if let Some(mapped) = parse_step_number(value).and_then(remap) {
                *value = Value::from(mapped);
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| remap_dependency_numbers(item, remap)),
        Value::Object(map) => {
            if let Some(step) = map.get_mut("sourceStep") {
                remap_dependency_numbers(step, remap);
            } else {
                map.values_mut()
                    .for_each(|item| remap_dependency_numbers(item, remap));
            }
        }
        _ => {}
    }
}

/// Ordered sequence of steps.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Parse a plan payload.
    ///
    /// Accepts a step array, an object wrapping it under `plan` or `steps`,
    /// a single step object, or a JSON string holding any of those.
    pub fn from_value(value: Value) -> Result<Self, PlanError> {
        match value {
            Value::Array(items) => Self::from_steps(items),
            Value::Object(mut map) => {
                if let Some(inner) = map.remove("plan").or_else(|| map.remove("steps")) {
                    Self::from_value(inner)
                } else if map.contains_key("actionVerb") {
                    Self::from_steps(vec![Value::Object(map)])
                } else {
                    Err(PlanError::Shape(
                        "object has no 'plan' or 'steps' array".to_string(),
                    ))
                }
            }
            Value::String(text) => Self::from_json_text(&text),
            other => Err(PlanError::Shape(format!(
                "expected an array of steps, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Read each step on its own so one bad step names itself instead of
    /// sinking the whole payload.
    fn from_steps(items: Vec<Value>) -> Result<Self, PlanError> {
        let mut steps = Vec::with_capacity(items.len());
        let mut findings = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match parse_step(index + 1, item) {
                Ok(step) => steps.push(step),
                Err(finding) => findings.push(finding),
            }
        }
        if findings.is_empty() {
            Ok(Self::new(steps))
        } else {
            Err(PlanError::Steps(findings))
        }
    }

    pub fn from_json_text(text: &str) -> Result<Self, PlanError> {
        let value: Value = serde_json::from_str(text.trim())?;
        if value.is_string() {
            return Err(PlanError::Shape("expected an array of steps, got string".into()));
        }
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn step(&self, number: StepNumber) -> Option<&Step> {
        self.steps.iter().find(|s| s.number == number)
    }

    /// Index of the first step with this number.
    pub fn position(&self, number: StepNumber) -> Option<usize> {
        self.steps.iter().position(|s| s.number == number)
    }

    /// Step numbers occurring more than once, in first-repeat order.
    pub fn duplicate_numbers(&self) -> Vec<StepNumber> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for step in &self.steps {
            if !seen.insert(step.number) && !duplicates.contains(&step.number) {
                duplicates.push(step.number);
            }
        }
        duplicates
    }
}

/// Parse the step at 1-based `position`. Failures are attributed to the step
/// number when it can be read, to the position otherwise.
fn parse_step(position: usize, raw: Value) -> Result<Step, String> {
    let Value::Object(map) = &raw else {
        return Err(format!(
            "Step at position {}: must be an object, got {}",
            position,
            json_kind(&raw)
        ));
    };
    let number = match map.get("number") {
        None => return Err(format!("Step at position {}: Missing 'number'", position)),
        Some(n) => parse_step_number(n).ok_or_else(|| {
            format!("Step at position {}: Invalid step number {}", position, n)
        })?,
    };
    match map.get("actionVerb") {
        Some(Value::String(verb)) if !verb.trim().is_empty() => {}
        None => return Err(format!("Step {}: Missing 'actionVerb'", number)),
        Some(_) => return Err(format!("Step {}: Invalid 'actionVerb'", number)),
    }
    serde_json::from_value(raw).map_err(|e| format!("Step {}: {}", number, e))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of structural validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
