//! Structural error types.
//!
//! Only the inheritance resolver raises errors: an unknown or cyclic
//! `$extend` target means the mapping library is unusable. Everything else
//! degrades gracefully — unknown plugin/transformer/initializer names are
//! no-ops and missing pointers resolve to nothing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("unknown $extend target '{parent}' referenced by mapping '{id}'")]
    UnknownExtend { id: String, parent: String },

    #[error("$extend cycle detected: {chain}")]
    ExtendCycle { chain: String },
}
