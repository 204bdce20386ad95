//! The mapper façade: mapping registration, input normalization, and the
//! evaluation entry point.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::context::{Changes, Context, SharedDoc};
use crate::error::MapperError;
use crate::evaluator;
use crate::extend::Library;
use crate::registry::Registries;
use crate::violation::Violation;

// ---------------------------------------------------------------------------
// Stdout sink
// ---------------------------------------------------------------------------

/// Destination of the `stdout` side channel.
///
/// Defaults to the process's standard output; swap it with
/// [`Mapper::with_stdout`] to capture emissions in tests.
#[derive(Clone)]
pub struct StdoutSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl StdoutSink {
    /// A sink writing to the process's standard output.
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// A sink writing to an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        StdoutSink {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub(crate) fn emit(&self, text: &str) {
        let mut writer = self.writer.lock();
        if let Err(err) = writeln!(writer, "{text}") {
            tracing::warn!(error = %err, "stdout sink write failed");
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::stdout()
    }
}

// ---------------------------------------------------------------------------
// Outcome envelope
// ---------------------------------------------------------------------------

/// Result of one evaluation: the produced document plus its validation
/// verdict. Serializes with the output flattened, so the wire shape is
/// `{ …target, "valid": …, "errors": […] }`.
#[derive(Debug, Clone, Serialize)]
pub struct MapOutcome {
    #[serde(flatten)]
    pub output: Value,
    pub valid: bool,
    pub errors: Vec<Violation>,
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// Holds the mapping library and the host-supplied function registries.
///
/// Mappings are flattened against their `$extend` ancestry at registration
/// time; an unknown or cyclic target fails construction.
pub struct Mapper {
    library: Library,
    registries: Arc<Registries>,
    sink: StdoutSink,
}

impl Mapper {
    /// Build a mapper, registering every mapping under `descriptor.mappings`.
    pub fn new(descriptor: &Value, registries: Registries) -> Result<Self, MapperError> {
        let mut library = Library::new();
        if let Some(mappings) = descriptor.get("mappings").and_then(Value::as_array) {
            for mapping in mappings {
                library.register(mapping);
            }
        }
        library.rebuild()?;
        Ok(Mapper {
            library,
            registries: Arc::new(registries),
            sink: StdoutSink::stdout(),
        })
    }

    /// Redirect the `stdout` side channel.
    #[must_use]
    pub fn with_stdout(mut self, sink: StdoutSink) -> Self {
        self.sink = sink;
        self
    }

    /// Register additional mappings: either one mapping descriptor with an
    /// `$id`, or a container with a `mappings` array.
    pub fn add(&mut self, descriptor: &Value) -> Result<(), MapperError> {
        match descriptor.get("mappings").and_then(Value::as_array) {
            Some(mappings) => {
                for mapping in mappings {
                    self.library.register(mapping);
                }
            }
            None => {
                self.library.register(descriptor);
            }
        }
        self.library.rebuild()
    }

    /// Evaluate `descriptor` against `input`, optionally seeding the output
    /// with `initial`.
    ///
    /// The descriptor is normalized first: a `mappings` container registers
    /// its entries and evaluates the last one; a bare object without a
    /// `mapping` key is wrapped as one; an array input is rewrapped under
    /// `/items` and projected element-wise.
    pub async fn map(
        &self,
        descriptor: &Value,
        input: Value,
        initial: Option<Value>,
    ) -> Result<MapOutcome, MapperError> {
        let mut library = self.library.clone();
        let mut wrapped = descriptor.clone();

        if let Some(mappings) = wrapped.get("mappings").and_then(Value::as_array) {
            for mapping in mappings {
                library.register(mapping);
            }
            library.rebuild()?;
            wrapped = match library.last_id().and_then(|id| library.get(id)) {
                Some(last) => last.clone(),
                None => json!({}),
            };
        } else if wrapped.is_object() && wrapped.get("mapping").is_none() {
            wrapped = json!({ "mapping": wrapped });
        }

        let mut input = input;
        if input.is_array() {
            wrapped = json!({
                "mapping": {
                    "/items": { "source": "/items", "each": wrapped }
                }
            });
            input = json!({ "items": input });
        }

        let output: SharedDoc = Arc::new(Mutex::new(initial.unwrap_or_else(|| json!({}))));
        let context = Context::root(
            input,
            output.clone(),
            Arc::new(library),
            self.registries.clone(),
            self.sink.clone(),
        );
        let errors = context.errors.clone();

        let _ = evaluator::map(wrapped, context, Changes::default()).await;

        let errors = errors.lock().clone();
        let output = output.lock().clone();
        Ok(MapOutcome {
            output,
            valid: errors.is_empty(),
            errors,
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
