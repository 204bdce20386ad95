//! Constraint checks run after value derivation.
//!
//! Checks never change the value and never throw: each failure appends a
//! [`Violation`] to the shared accumulator. `default` and coercion run
//! after validation, so a defaulted value is never what gets validated.
//!
//! Numeric bounds are guarded on key presence, so `maximum: 0` and
//! `minimum: 0` are enforced.

use regex::Regex;
use serde_json::Value;

use crate::context::Context;
use crate::descriptor::truthy;
use crate::violation::{Violation, ViolationKind};

/// Run every constraint carried by `descriptor` against `value`,
/// appending failures to the context's error list.
pub(crate) fn apply(descriptor: &Value, value: Option<&Value>, context: &Context) {
    let mut push = |kind: ViolationKind, message: String| {
        context.push_error(Violation::for_descriptor(descriptor, value, kind, message));
    };

    if let Some(expected) = descriptor.get("type").and_then(Value::as_str) {
        if let Some(v) = value {
            if !type_matches(expected, v) {
                push(
                    ViolationKind::Type {
                        expected: expected.to_string(),
                    },
                    format!("expected type '{expected}', got {v}"),
                );
            }
        }
    }

    if let Some(maximum) = descriptor.get("maximum").and_then(Value::as_f64) {
        if let Some(n) = value.and_then(Value::as_f64) {
            if n.is_finite() && n > maximum {
                push(
                    ViolationKind::Maximum { maximum },
                    format!("{n} exceeds maximum {maximum}"),
                );
            }
        }
    }

    if let Some(minimum) = descriptor.get("minimum").and_then(Value::as_f64) {
        if let Some(n) = value.and_then(Value::as_f64) {
            if n.is_finite() && n < minimum {
                push(
                    ViolationKind::Minimum { minimum },
                    format!("{n} is less than minimum {minimum}"),
                );
            }
        }
    }

    if let Some(step) = descriptor.get("multipleOf").and_then(Value::as_f64) {
        if let Some(n) = value.and_then(Value::as_f64) {
            if step != 0.0 && !is_multiple_of(n, step) {
                push(
                    ViolationKind::MultipleOf { multiple_of: step },
                    format!("{n} is not a multiple of {step}"),
                );
            }
        }
    }

    if let Some(min_length) = descriptor.get("minLength").and_then(Value::as_u64) {
        if let Some(len) = value.and_then(length_of) {
            if len < min_length {
                push(
                    ViolationKind::MinLength { min_length },
                    format!("length {len} is less than minLength {min_length}"),
                );
            }
        }
    }

    if let Some(max_length) = descriptor.get("maxLength").and_then(Value::as_u64) {
        if let Some(len) = value.and_then(length_of) {
            if len > max_length {
                push(
                    ViolationKind::MaxLength { max_length },
                    format!("length {len} exceeds maxLength {max_length}"),
                );
            }
        }
    }

    if let Some(allowed) = descriptor.get("enum").and_then(Value::as_array) {
        if let Some(v) = value {
            if !allowed.contains(v) {
                push(
                    ViolationKind::Enum {
                        allowed: allowed.clone(),
                    },
                    format!("{v} is not one of the allowed values"),
                );
            }
        }
    }

    if let Some(pattern) = descriptor.get("pattern").and_then(Value::as_str) {
        if let Some(text) = value.and_then(Value::as_str) {
            match Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(text) {
                        push(
                            ViolationKind::Pattern {
                                pattern: pattern.to_string(),
                            },
                            format!("'{text}' does not match pattern '{pattern}'"),
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "invalid pattern, skipping check");
                }
            }
        }
    }

    if let Some(required) = descriptor.get("required") {
        if truthy(required) && value.is_none() {
            push(
                ViolationKind::Required,
                "required value is missing".to_string(),
            );
        }
    }
}

/// `array|boolean|integer|null|number|object|string` membership.
///
/// `integer` follows the source language's numeric coercion: numeric
/// strings and booleans count when they coerce to a whole number.
/// `object` excludes arrays and null.
fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "array" => value.is_array(),
        "boolean" => value.is_boolean(),
        "integer" => coerced_number(value).is_some_and(|n| n.is_finite() && n.fract() == 0.0),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "object" => value.is_object(),
        "string" => value.is_string(),
        _ => true,
    }
}

/// JS `Number()` coercion, `None` standing in for NaN.
fn coerced_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Length for strings and arrays; other shapes have none.
fn length_of(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => Some(s.chars().count() as u64),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}

/// Decimal-aware multiple check: both operands are scaled to integers by
/// the step's decimal width before the remainder test.
fn is_multiple_of(value: f64, step: f64) -> bool {
    let decimals = {
        let text = format!("{step}");
        text.split('.').nth(1).map_or(0, str::len) as u32
    };
    let factor = 10f64.powi(decimals as i32);
    let scaled_value = (value * factor).round();
    let scaled_step = (step * factor).round();
    if scaled_step == 0.0 {
        return false;
    }
    (scaled_value % scaled_step).abs() < f64::EPSILON
}

// ===========================================================================
// Tests
// ===========================================================================
