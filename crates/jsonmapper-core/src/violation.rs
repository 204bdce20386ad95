//! Structured validation records accumulated during evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single validation failure, appended to the shared error list.
///
/// Carries the addressing pointers of the descriptor that failed (whichever
/// of `source`/`target`/`input`/`output` were present), the offending value,
/// and the violated constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// The value that failed validation (`null` when the value was absent).
    pub value: Value,
    #[serde(flatten)]
    pub kind: ViolationKind,
    /// Human-readable description of the failure.
    pub message: String,
}

/// The violated constraint, tagged by its descriptor keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "camelCase")]
pub enum ViolationKind {
    Type { expected: String },
    Maximum { maximum: f64 },
    Minimum { minimum: f64 },
    #[serde(rename_all = "camelCase")]
    MultipleOf { multiple_of: f64 },
    #[serde(rename_all = "camelCase")]
    MinLength { min_length: u64 },
    #[serde(rename_all = "camelCase")]
    MaxLength { max_length: u64 },
    Enum { allowed: Vec<Value> },
    Pattern { pattern: String },
    Required,
}

impl ViolationKind {
    /// The descriptor keyword this violation corresponds to.
    pub fn constraint(&self) -> &'static str {
        match self {
            ViolationKind::Type { .. } => "type",
            ViolationKind::Maximum { .. } => "maximum",
            ViolationKind::Minimum { .. } => "minimum",
            ViolationKind::MultipleOf { .. } => "multipleOf",
            ViolationKind::MinLength { .. } => "minLength",
            ViolationKind::MaxLength { .. } => "maxLength",
            ViolationKind::Enum { .. } => "enum",
            ViolationKind::Pattern { .. } => "pattern",
            ViolationKind::Required => "required",
        }
    }
}

impl Violation {
    /// Build a violation for `descriptor`, copying its addressing pointers.
    pub(crate) fn for_descriptor(
        descriptor: &Value,
        value: Option<&Value>,
        kind: ViolationKind,
        message: String,
    ) -> Self {
        let pointer_of = |key: &str| {
            descriptor
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Violation {
            source: pointer_of("source"),
            target: pointer_of("target"),
            input: pointer_of("input"),
            output: pointer_of("output"),
            value: value.cloned().unwrap_or(Value::Null),
            kind,
            message,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
