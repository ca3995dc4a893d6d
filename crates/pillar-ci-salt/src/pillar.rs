//! Interpreting what the salt master hands back.

use pillar_ci_core::{ConfigTree, RenderError, RenderResult};
use serde_json::Value;

/// Key under which salt reports pillar compilation errors.
pub const PILLAR_ERRORS_KEY: &str = "_errors";

/// Turn a rendered pillar document into a tree.
///
/// The document must be a JSON object. Salt does not fail a pillar compile
/// outright; it returns the partial pillar with an `_errors` list instead, which
/// is treated as a failed render so no diff runs against half-compiled data.
pub fn pillar_from_value(node: &str, environment: &str, value: Value) -> RenderResult<ConfigTree> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(RenderError::malformed(
                node,
                environment,
                format!("expected a pillar mapping, got {}", type_name(&other)),
            ))
        }
    };

    if let Some(errors) = map.remove(PILLAR_ERRORS_KEY) {
        let message = match errors {
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        };
        return Err(RenderError::failed(
            node,
            environment,
            format!("pillar compilation errors: {message}"),
        ));
    }

    Ok(ConfigTree::from(Value::Object(map)))
}

/// Parse raw JSON text from the master.
pub fn pillar_from_str(node: &str, environment: &str, raw: &str) -> RenderResult<ConfigTree> {
    if raw.trim().is_empty() {
        return Err(RenderError::malformed(node, environment, "empty output"));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| RenderError::malformed(node, environment, format!("invalid JSON: {e}")))?;
    pillar_from_value(node, environment, value)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
