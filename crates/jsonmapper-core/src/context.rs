//! Ambient evaluation state threaded down the descriptor tree.
//!
//! A context is cheap to clone: documents are behind `Arc`, the mutable
//! `output`/`target` documents and the error accumulator behind short-lived
//! locks. Locks are never held across an await point.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::descriptor;
use crate::extend::Library;
use crate::mapper::StdoutSink;
use crate::registry::Registries;
use crate::scope;
use crate::violation::Violation;

/// A shared, in-place-mutated JSON document (`output` and mapping targets).
pub type SharedDoc = Arc<Mutex<Value>>;

/// The shared, append-only validation error accumulator.
pub type ErrorSink = Arc<Mutex<Vec<Violation>>>;

/// The source/target pointer scopes accumulated while descending.
#[derive(Debug, Clone)]
pub struct Paths {
    pub source: String,
    pub target: String,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            source: "/".to_string(),
            target: "/".to_string(),
        }
    }
}

/// Per-descriptor overrides applied by [`shift`].
#[derive(Default)]
pub(crate) struct Changes {
    pub source: Option<Value>,
    pub target: Option<SharedDoc>,
    pub index: Option<usize>,
}

/// One evaluation frame.
#[derive(Clone)]
pub struct Context {
    /// Root input document, immutable across the evaluation.
    pub input: Arc<Value>,
    /// Current source root (defaults to `input`).
    pub source: Arc<Value>,
    /// Root output document, mutated in place.
    pub output: SharedDoc,
    /// Current mapping's target document (top level: the root output).
    pub target: SharedDoc,
    pub paths: Paths,
    pub errors: ErrorSink,
    pub library: Arc<Library>,
    pub registries: Arc<Registries>,
    pub(crate) sink: StdoutSink,
    /// Ordered pairings of the current mapping.
    pub(crate) pairings: Vec<(String, Value)>,
}

impl Context {
    /// Build the root context for one façade evaluation.
    pub(crate) fn root(
        input: Value,
        output: SharedDoc,
        library: Arc<Library>,
        registries: Arc<Registries>,
        sink: StdoutSink,
    ) -> Self {
        let input = Arc::new(input);
        Context {
            source: input.clone(),
            input,
            target: output.clone(),
            output,
            paths: Paths::default(),
            errors: Arc::new(Mutex::new(Vec::new())),
            library,
            registries,
            sink,
            pairings: Vec::new(),
        }
    }

    /// Append one validation error.
    pub fn push_error(&self, violation: Violation) {
        self.errors.lock().push(violation);
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    /// Snapshot of the current target document.
    pub fn target_snapshot(&self) -> Value {
        self.target.lock().clone()
    }

    /// Snapshot of the current output document.
    pub fn output_snapshot(&self) -> Value {
        self.output.lock().clone()
    }
}

/// Derive a child context for `descriptor` from `parent`.
///
/// Source and target roots come from `changes` where given, else are
/// inherited; the descriptor's own `source`/`target` offsets extend the
/// pointer scopes (with the `each` index inserted between the enclosing
/// scope and the source offset); pairings are recomputed from the
/// descriptor's resolved sub-mapping. Everything else is inherited by
/// reference.
pub(crate) fn shift(descriptor: &Value, parent: &Context, changes: Changes) -> Context {
    let mut context = parent.clone();

    if let Some(source) = changes.source {
        context.source = Arc::new(source);
    }
    if let Some(target) = changes.target {
        context.target = target;
    }

    if let Some(offset) = descriptor.get("source").and_then(Value::as_str) {
        context.paths.source = match changes.index {
            Some(index) => {
                let index = index.to_string();
                scope::resolve(&parent.paths.source, &[index.as_str(), offset])
            }
            None => scope::resolve(&parent.paths.source, &[offset]),
        };
    }
    if let Some(offset) = descriptor.get("target").and_then(Value::as_str) {
        context.paths.target = scope::resolve(&parent.paths.target, &[offset]);
    }

    context.pairings = descriptor::sub_mapping(descriptor)
        .and_then(|sub| descriptor::deref(sub, &context.library))
        .map(|resolved| descriptor::pairings(&resolved))
        .unwrap_or_default();

    context
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_context(input: Value) -> Context {
        Context::root(
            input,
            Arc::new(Mutex::new(json!({}))),
            Arc::new(Library::new()),
            Arc::new(Registries::new()),
            StdoutSink::from_writer(Vec::new()),
        )
    }

    #[test]
    fn test_shift_appends_source_offset() {
        let parent = root_context(json!({}));
        let child = shift(&json!({ "source": "/books" }), &parent, Changes::default());
        assert_eq!(child.paths.source, "/books");
        assert_eq!(child.paths.target, "/");
    }

    #[test]
    fn test_shift_inserts_index_between_scope_and_offset() {
        let mut parent = root_context(json!({}));
        parent.paths.source = "/books".to_string();

        let changes = Changes {
            index: Some(2),
            ..Changes::default()
        };
        let child = shift(&json!({ "source": "/title" }), &parent, changes);
        assert_eq!(child.paths.source, "/books/2/title");
    }

    #[test]
    fn test_shift_source_override() {
        let parent = root_context(json!({ "a": 1 }));
        let changes = Changes {
            source: Some(json!({ "b": 2 })),
            ..Changes::default()
        };
        let child = shift(&json!({}), &parent, changes);
        assert_eq!(*child.source, json!({ "b": 2 }));
        assert_eq!(*child.input, json!({ "a": 1 }));
    }

    #[test]
    fn test_shift_computes_pairings() {
        let parent = root_context(json!({}));
        let child = shift(
            &json!({ "each": { "mapping": { "/t": "/title" } } }),
            &parent,
            Changes::default(),
        );
        assert_eq!(child.pairings, vec![("/t".to_string(), json!("/title"))]);
    }

    #[test]
    fn test_errors_shared_between_parent_and_child() {
        let parent = root_context(json!({}));
        let child = shift(&json!({}), &parent, Changes::default());
        child.push_error(crate::violation::Violation::for_descriptor(
            &json!({}),
            None,
            crate::violation::ViolationKind::Required,
            "required value is missing".to_string(),
        ));
        assert!(parent.has_errors());
    }
}
