//! Mapping registration and eager `$extend` flattening.
//!
//! Every registered mapping is flattened against its `$extend` ancestry at
//! registration time, so evaluation never chases inheritance chains. An
//! unknown parent or a cycle aborts registration — an unresolvable library
//! is an unusable configuration.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::MapperError;

/// The registry of named mappings, keyed by `$id`.
///
/// Holds both the raw descriptors (so late additions can re-flatten against
/// the full set) and the flattened forms served to the evaluator.
#[derive(Debug, Clone, Default)]
pub struct Library {
    raw: Map<String, Value>,
    flat: Map<String, Value>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one mapping descriptor by its `$id`. Descriptors without an
    /// `$id` cannot be addressed and are ignored.
    ///
    /// Call [`rebuild`](Self::rebuild) after registering to flatten.
    pub fn register(&mut self, descriptor: &Value) -> bool {
        match descriptor.get("$id").and_then(Value::as_str) {
            Some(id) => {
                self.raw.insert(id.to_string(), descriptor.clone());
                true
            }
            None => {
                tracing::warn!("mapping descriptor without $id ignored");
                false
            }
        }
    }

    /// Flatten every registered mapping against its `$extend` ancestry.
    pub fn rebuild(&mut self) -> Result<(), MapperError> {
        let mut flat = Map::new();
        for id in self.raw.keys() {
            let mut visiting = Vec::new();
            flat.insert(id.clone(), flatten(id, &self.raw, &mut visiting)?);
        }
        self.flat = flat;
        Ok(())
    }

    /// Look up a flattened mapping by `$id`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.flat.get(name)
    }

    /// The `$id` of the most recently registered mapping.
    pub fn last_id(&self) -> Option<&str> {
        self.raw.keys().next_back().map(String::as_str)
    }
}

fn flatten(
    id: &str,
    raw: &Map<String, Value>,
    visiting: &mut Vec<String>,
) -> Result<Value, MapperError> {
    let descriptor = match raw.get(id) {
        Some(d) => d,
        None => return Ok(Value::Null),
    };
    let parent_id = match descriptor.get("$extend").and_then(Value::as_str) {
        None => return Ok(descriptor.clone()),
        Some(p) => p,
    };

    if visiting.iter().any(|seen| seen == id) {
        let mut chain = visiting.clone();
        chain.push(id.to_string());
        return Err(MapperError::ExtendCycle {
            chain: chain.join(" -> "),
        });
    }
    if !raw.contains_key(parent_id) {
        return Err(MapperError::UnknownExtend {
            id: id.to_string(),
            parent: parent_id.to_string(),
        });
    }

    visiting.push(id.to_string());
    let parent = flatten(parent_id, raw, visiting)?;
    visiting.pop();

    Ok(merge(&parent, descriptor))
}

/// Merge a flattened parent mapping with its child.
///
/// Top-level keys come from the child where present (so `$id`, `$extend`,
/// and `description` are the child's). The merged `mapping` unions both key
/// sets ordered by *last* occurrence of the parent-keys-then-child-keys
/// sequence: child order wins for keys the child defines, new keys append
/// in child source order, parent-only keys keep their parent position.
/// Entry values come from the child where present, else the parent.
pub(crate) fn merge(parent: &Value, child: &Value) -> Value {
    let mut merged = parent.as_object().cloned().unwrap_or_default();
    if let Some(child_obj) = child.as_object() {
        for (key, value) in child_obj {
            if key != "mapping" {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    let empty = Map::new();
    let parent_map = parent
        .get("mapping")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let child_map = child
        .get("mapping")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    // Reverse the concatenated key sequence, keep first occurrences, and
    // reverse back: this orders keys by their last occurrence.
    let concatenated: Vec<&String> = parent_map.keys().chain(child_map.keys()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reversed: Vec<&String> = Vec::new();
    for key in concatenated.into_iter().rev() {
        if seen.insert(key.as_str()) {
            reversed.push(key);
        }
    }

    let mut mapping = Map::new();
    for key in reversed.iter().rev() {
        let value = child_map
            .get(key.as_str())
            .or_else(|| parent_map.get(key.as_str()))
            .cloned()
            .unwrap_or(Value::Null);
        mapping.insert((*key).clone(), value);
    }
    merged.insert("mapping".to_string(), Value::Object(mapping));

    Value::Object(merged)
}

// ===========================================================================
// Tests
// ===========================================================================
