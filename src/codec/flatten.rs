//! Dot-path flattening of nested context trees
//!
//! Scalars map to one entry at their path, objects recurse per field, and
//! arrays recurse per base-10 index, so numeric path segments always denote
//! array positions on rebuild. Rebuilding expands sparse indices with null
//! placeholders and drops empty segments produced by doubled dots.

use serde_json::{Map, Value};

/// Collect the scalar leaves of `value`, each under a dotted path rooted at
/// `prefix`. A scalar `value` yields the single entry `(prefix, value)`.
pub fn leaves(prefix: &str, value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    collect_leaves(prefix, value, &mut out);
    out
}

fn collect_leaves(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (field, child) in map {
                collect_leaves(&join(prefix, field), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_leaves(&join(prefix, &index.to_string()), child, out);
            }
        }
        scalar => out.push((prefix.to_string(), scalar.clone())),
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Split a dotted path into its segments, dropping empty ones.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Write `value` at the addressed position, creating intermediate
/// containers as needed. Numeric segments create arrays and expand them
/// with null placeholders up to the index.
pub fn insert_path(root: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return;
    };

    match head.parse::<usize>() {
        Ok(index) => {
            let items = as_array_slot(root);
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            insert_path(&mut items[index], rest, value);
        }
        Err(_) => {
            let map = as_object_slot(root);
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            insert_path(slot, rest, value);
        }
    }
}

/// Remove the value at the addressed position. Object fields are dropped;
/// array slots are nulled so sibling indices keep their positions. Missing
/// paths are a no-op.
pub fn remove_path(root: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        match (root, head.parse::<usize>()) {
            (Value::Object(map), _) => {
                map.remove(*head);
            }
            (Value::Array(items), Ok(index)) => {
                if let Some(slot) = items.get_mut(index) {
                    *slot = Value::Null;
                }
            }
            _ => {}
        }
        return;
    }

    let child = match (root, head.parse::<usize>()) {
        (Value::Object(map), _) => map.get_mut(*head),
        (Value::Array(items), Ok(index)) => items.get_mut(index),
        _ => None,
    };
    if let Some(child) = child {
        remove_path(child, rest);
    }
}

/// Read the value at the addressed position, if present.
pub fn get_path<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_array_slot(slot: &mut Value) -> &mut Vec<Value> {
    if !matches!(slot, Value::Array(_)) {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just coerced to an array"),
    }
}

fn as_object_slot(slot: &mut Value) -> &mut Map<String, Value> {
    if !matches!(slot, Value::Object(_)) {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just coerced to an object"),
    }
}
