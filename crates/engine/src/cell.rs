// Cell values are untyped JSON scalars as received from the backend:
// string, number, boolean or null.

use serde_json::{Number, Value};

/// Render a cell for display and text export.
///
/// Null renders as an empty string. Nested values (which the backend should
/// never send) fall back to their compact JSON text.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse free text into a cell value of the same nominal class as `existing`.
///
/// Best-effort only: an empty input clears the cell, numbers stay numbers when
/// the text parses, booleans stay booleans for `true`/`false`, and everything
/// else is stored as text.
pub fn coerce_like(existing: &Value, input: &str) -> Value {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Value::Null;
    }

    match existing {
        Value::Number(_) => parse_number(trimmed).unwrap_or_else(|| Value::String(input.to_string())),
        Value::Bool(_) => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(input.to_string()),
        },
        Value::Null => parse_number(trimmed).unwrap_or_else(|| Value::String(input.to_string())),
        _ => Value::String(input.to_string()),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// True for the scalar shapes a record is expected to hold.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
