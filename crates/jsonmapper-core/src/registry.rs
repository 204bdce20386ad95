//! Host-supplied function registries.
//!
//! Three name → function maps drive the pipeline's extension points:
//! initializers and transformers are synchronous value rewrites, plugins
//! are asynchronous and receive their sub-descriptor plus the evaluation
//! context. Missing names are silent no-ops everywhere.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::context::Context;

/// `initializers[name](value, context) → value'`
pub type InitializerFn =
    Arc<dyn Fn(Option<Value>, &Context) -> Option<Value> + Send + Sync>;

/// `transformers[name](value, context, options?) → value'`
pub type TransformerFn =
    Arc<dyn Fn(Option<Value>, &Context, Option<&Value>) -> Option<Value> + Send + Sync>;

/// `plugins[name](sub-descriptor, value, context) → value'`, possibly async.
pub type PluginFn =
    Arc<dyn Fn(Value, Option<Value>, Context) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// The three registries, built once and shared read-only across an
/// evaluation.
#[derive(Clone, Default)]
pub struct Registries {
    initializers: HashMap<String, InitializerFn>,
    transformers: HashMap<String, TransformerFn>,
    plugins: HashMap<String, PluginFn>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named initializer.
    #[must_use]
    pub fn initializer<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<Value>, &Context) -> Option<Value> + Send + Sync + 'static,
    {
        self.initializers.insert(name.into(), Arc::new(f));
        self
    }

    /// Register a named transformer.
    #[must_use]
    pub fn transformer<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<Value>, &Context, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.transformers.insert(name.into(), Arc::new(f));
        self
    }

    /// Register a named plugin. The plugin receives owned copies of its
    /// sub-descriptor, the pipeline value, and the context.
    #[must_use]
    pub fn plugin<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, Option<Value>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        self.plugins.insert(
            name.into(),
            Arc::new(move |descriptor, value, context| f(descriptor, value, context).boxed()),
        );
        self
    }

    pub(crate) fn initializer_named(&self, name: &str) -> Option<&InitializerFn> {
        self.initializers.get(name)
    }

    pub(crate) fn transformer_named(&self, name: &str) -> Option<&TransformerFn> {
        self.transformers.get(name)
    }

    pub(crate) fn plugin_named(&self, name: &str) -> Option<&PluginFn> {
        self.plugins.get(name)
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("initializers", &self.initializers.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}
