//! Declarative, descriptor-driven JSON-to-JSON mapping.
//!
//! A *mapping* is a tree-shaped JSON descriptor pairing target pointers
//! with source-side descriptors. Evaluating a mapping against an input
//! document produces an output document plus a list of validation errors:
//!
//! ```
//! use jsonmapper_core::{Mapper, Registries};
//! use serde_json::json;
//!
//! let mapper = Mapper::new(&json!({}), Registries::new()).unwrap();
//! let outcome = futures::executor::block_on(mapper.map(
//!     &json!({ "mapping": { "/name": "/user/name" } }),
//!     json!({ "user": { "name": "Ada" } }),
//!     None,
//! ))
//! .unwrap();
//!
//! assert_eq!(outcome.output, json!({ "name": "Ada" }));
//! assert!(outcome.valid);
//! ```
//!
//! Descriptors compose source selection (`source`, `target`, `input`,
//! `output`, `first`, `last`, `all`, `switch`, `find`), projection
//! (`mapping`, `each`), a staged value pipeline (`concat`, `init`,
//! `constant`, `random`, `template`, `transform`, `default`, `as`),
//! JSON-Schema-like validation (`type`, `minimum`, `maximum`, `enum`,
//! `pattern`, …), and inheritance (`$extend`). Host applications extend the
//! pipeline with named [initializers, transformers, and plugins](Registries).
//!
//! Evaluation is asynchronous: plugins may suspend, and sibling work
//! (`each` elements, `all`/`first`/`last` lists) runs concurrently while
//! the pairings of a single mapping stay sequential.

pub mod context;
pub mod pointer;
pub mod scope;

mod descriptor;
mod error;
mod evaluator;
mod extend;
mod mapper;
mod pipeline;
mod registry;
mod validate;
mod violation;

pub use context::Context;
pub use error::MapperError;
pub use extend::Library;
pub use mapper::{MapOutcome, Mapper, StdoutSink};
pub use registry::{InitializerFn, PluginFn, Registries, TransformerFn};
pub use violation::{Violation, ViolationKind};
