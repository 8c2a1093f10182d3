//! Type-tagged scalar codec for context fields
//!
//! Hash fields can only hold strings, so non-string scalars carry a leading
//! `__type__` token. Plain strings are stored untouched, which keeps the
//! codec lossless: the string `"true"` stays `"true"` because only the
//! tagged form `__boolean__true` decodes to a boolean.

use serde_json::Value;

const BOOLEAN_TAG: &str = "boolean";
const NUMBER_TAG: &str = "number";
const NULL_TAG: &str = "null";
const UNDEFINED_TAG: &str = "undefined";

/// Encode one scalar for storage. Containers are flattened before they
/// reach this function; any that slip through are stored as JSON text.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Bool(flag) => format!("__{}__{}", BOOLEAN_TAG, flag),
        Value::Number(number) => format!("__{}__{}", NUMBER_TAG, number),
        Value::Null => format!("__{}__", NULL_TAG),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Decode one stored field back into a value. `None` means the field held
/// the undefined marker and the entry should be skipped on rebuild. An
/// unknown tag falls back to the raw post-tag content.
pub fn decode(raw: &str) -> Option<Value> {
    let Some(tagged) = raw.strip_prefix("__") else {
        return Some(Value::String(raw.to_string()));
    };
    let Some((tag, content)) = tagged.split_once("__") else {
        return Some(Value::String(raw.to_string()));
    };

    match tag {
        BOOLEAN_TAG => Some(Value::Bool(content == "true")),
        NUMBER_TAG => Some(decode_number(content)),
        NULL_TAG => Some(Value::Null),
        UNDEFINED_TAG => None,
        _ => Some(Value::String(content.to_string())),
    }
}

fn decode_number(content: &str) -> Value {
    if let Ok(int) = content.parse::<i64>() {
        return Value::Number(int.into());
    }
    content
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(content.to_string()))
}
