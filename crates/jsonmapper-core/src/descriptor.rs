//! Descriptor shape classification and dereferencing.
//!
//! Descriptors stay raw `serde_json::Value`s — the language is an open sum
//! discriminated by key presence (`mapping`/`each` → mapping node, `$ref` →
//! reference, array → disjunction list, string → pointer-or-name), and any
//! key not recognized by the pipeline may address a plugin. These helpers
//! are the only place that shape knowledge lives.

use serde_json::Value;

use crate::extend::Library;

/// Whether the descriptor is a mapping node (projects a sub-mapping).
pub(crate) fn is_mapping(descriptor: &Value) -> bool {
    descriptor.get("mapping").is_some() || descriptor.get("each").is_some()
}

/// The descriptor's sub-mapping, from `mapping` or `each`.
pub(crate) fn sub_mapping(descriptor: &Value) -> Option<&Value> {
    descriptor.get("mapping").or_else(|| descriptor.get("each"))
}

/// Ordered `(target pointer, source descriptor)` entries of a resolved
/// mapping, which may nest them under a `mapping` key.
pub(crate) fn pairings(mapping: &Value) -> Vec<(String, Value)> {
    let entries = match mapping.get("mapping") {
        Some(Value::Object(inner)) => inner,
        _ => match mapping {
            Value::Object(obj) => obj,
            _ => return Vec::new(),
        },
    };
    entries
        .iter()
        .map(|(left, right)| (left.clone(), right.clone()))
        .collect()
}

/// Resolve a reference into a concrete descriptor.
///
/// - A string naming a registered mapping yields that mapping; any other
///   string passes through (downstream treats it as a pointer).
/// - An object with `$ref` looks up the named mapping; a missing name
///   yields `None` and downstream treats the descriptor as a no-op.
/// - Everything else passes through unchanged.
pub(crate) fn deref(descriptor: &Value, library: &Library) -> Option<Value> {
    match descriptor {
        Value::String(name) => match library.get(name) {
            Some(mapping) => Some(mapping.clone()),
            None => Some(descriptor.clone()),
        },
        Value::Object(obj) => match obj.get("$ref") {
            Some(Value::String(name)) => {
                let resolved = library.get(name).cloned();
                if resolved.is_none() {
                    tracing::debug!(reference = %name, "unresolvable $ref, skipping");
                }
                resolved
            }
            _ => Some(descriptor.clone()),
        },
        _ => Some(descriptor.clone()),
    }
}

/// JS-style truthiness over JSON values.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
