//! Pull plan JSON out of a free-text reasoner reply

use planguard_core::PlanError;
use serde_json::Value;

/// Find the plan in `text`.
///
/// Tried in order: the whole text as JSON, the first fenced code block, then
/// the first JSON array or object embedded in prose. A `{"plan": ...}` or
/// `{"steps": ...}` wrapper is removed.
pub fn extract_plan(text: &str) -> Result<Value, PlanError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PlanError::NotFound);
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(unwrap_plan(value));
    }

    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            return Ok(unwrap_plan(value));
        }
    }

    embedded_json(text).map(unwrap_plan).ok_or(PlanError::NotFound)
}

/// Drop a single `plan`/`steps` wrapper, and decode a plan sent as a JSON string.
pub fn unwrap_plan(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("plan") || map.contains_key("steps") => {
            match map.remove("plan").or_else(|| map.remove("steps")) {
                Some(inner) => unwrap_plan(inner),
                None => Value::Object(map),
            }
        }
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(inner) if inner.is_array() || inner.is_object() => unwrap_plan(inner),
            _ => Value::String(text),
        },
        other => other,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // skip the language tag, if any
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn embedded_json(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '[' || *c == '{')
        .find_map(|(i, _)| {
            serde_json::Deserializer::from_str(&text[i..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
                .filter(|v| v.is_array() || v.is_object())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_block_without_language_tag() {
        let text = "```\n[{\"number\": 1}]\n```";
        assert_eq!(extract_plan(text).unwrap(), json!([{"number": 1}]));
    }

    #[test]
    fn string_payload_is_decoded() {
        let value = json!("[{\"number\": 1}]");
        assert_eq!(unwrap_plan(value), json!([{"number": 1}]));
    }
}
