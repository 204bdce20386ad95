//! The value pipeline: ordered stages turning a leaf descriptor plus a
//! context into a value.
//!
//! Stage order is fixed: source selection, `switch`, the plugin chain,
//! `find`, `concat`, `init`, `constant`, `random`, `template`, `transform`,
//! validation, `default`, `regexp_i`, `as`. Validation runs before
//! `default`, so a defaulted value is never validated. The pipeline is
//! asynchronous because plugins and template rendering may be.
//!
//! Plugin dispatch walks the descriptor's keys in insertion order — any key
//! naming a registered plugin participates, in the order it appears.

use std::sync::OnceLock;

use futures::future::{join_all, BoxFuture};
use regex::Regex;
use serde_json::Value;

use crate::context::{Changes, Context};
use crate::descriptor::truthy;
use crate::evaluator;
use crate::pointer;
use crate::scope;
use crate::validate;

/// Derive the value described by `descriptor` under `context`.
pub(crate) fn evaluate(descriptor: Value, context: Context) -> BoxFuture<'static, Option<Value>> {
    Box::pin(async move {
        // 1. Source selection — first match wins.
        let mut value: Option<Value> = select_source(&descriptor, &context).await;

        // 2. Branch on a key read out of the freshly computed value.
        if let Some(switch) = descriptor.get("switch").cloned() {
            value = apply_switch(&switch, value, &context).await;
        }

        // 3. Plugin chain, in descriptor key order.
        let plugin_entries: Vec<(String, Value)> = descriptor
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(key, _)| context.registries.plugin_named(key).is_some())
                    .map(|(key, sub)| (key.clone(), sub.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for (name, sub) in plugin_entries {
            let Some(plugin) = context.registries.plugin_named(&name).cloned() else {
                continue;
            };
            tracing::debug!(plugin = %name, "invoking plugin");
            let mut result = plugin(sub.clone(), value, context.clone()).await;
            if let Some(p) = sub.get("pointer").and_then(Value::as_str) {
                result = result.as_ref().and_then(|v| pointer::get(v, p)).cloned();
            }
            value = result;
        }

        // 4. Select the first element matching every `eq` pair.
        if let Some(find) = descriptor.get("find") {
            if let Some(eq) = find.get("eq").and_then(Value::as_object) {
                let candidates: Vec<Value> = match value.take() {
                    Some(Value::Array(items)) => items,
                    Some(single) => vec![single],
                    None => Vec::new(),
                };
                let hit = candidates
                    .into_iter()
                    .find(|item| eq.iter().all(|(key, want)| item.get(key) == Some(want)));
                value = match (hit, find.get("pointer").and_then(Value::as_str)) {
                    (Some(item), Some(p)) => pointer::get(&item, p).cloned(),
                    (Some(item), None) => Some(item),
                    (None, _) => None,
                };
            }
        }

        // 5. Flatten one level.
        if descriptor.get("concat").is_some_and(truthy) {
            value = match value {
                Some(Value::Array(items)) => {
                    let mut flat = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Array(inner) => flat.extend(inner),
                            other => flat.push(other),
                        }
                    }
                    Some(Value::Array(flat))
                }
                other => other,
            };
        }

        // 6. Named initializer.
        if let Some(name) = descriptor.get("init").and_then(Value::as_str) {
            match context.registries.initializer_named(name) {
                Some(init) => value = init(value, &context),
                None => tracing::debug!(initializer = %name, "unknown initializer, skipping"),
            }
        }

        // 7. Constant replacement.
        if let Some(constant) = descriptor.get("constant") {
            value = Some(constant.clone());
        }

        // 8. Random selection from an array value.
        if let Some(count) = descriptor.get("random").and_then(Value::as_u64) {
            if count >= 1 {
                let unique = descriptor.get("unique").is_some_and(truthy);
                value = match value {
                    Some(Value::Array(items)) => pick_random(&items, count, unique),
                    other => other,
                };
            }
        }

        // 9. Template rendering against a sub-mapping's parameter object.
        if let Some(template) = descriptor.get("template").and_then(Value::as_str) {
            if descriptor.get("mapping").is_some() && matches!(value, Some(Value::Object(_))) {
                let changes = Changes {
                    source: value.clone(),
                    ..Changes::default()
                };
                let params =
                    evaluator::nest(descriptor.clone(), context.clone(), changes).await;
                value = Some(Value::String(render_template(template, params.as_ref())));
            }
        }

        // 10. Transformer fold.
        match descriptor.get("transform") {
            Some(Value::String(name)) => {
                value = apply_transformer(name, value, &context, None);
            }
            Some(Value::Array(steps)) => {
                for step in steps {
                    match step {
                        Value::String(name) => {
                            value = apply_transformer(name, value, &context, None);
                        }
                        Value::Object(options) => {
                            for (name, opts) in options {
                                value = apply_transformer(name, value, &context, Some(opts));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        // 11. Validation appends errors, never changes the value.
        validate::apply(&descriptor, value.as_ref(), &context);

        // 12. Default fills in only an absent value.
        if value.is_none() {
            value = descriptor.get("default").cloned();
        }

        // 13. Case-insensitive regular-expression literal wrap.
        if descriptor.get("regexp_i").is_some_and(truthy) {
            if let Some(v) = &value {
                value = Some(Value::String(format!("/{}/i", stringify(v))));
            }
        }

        // 14. Coercion.
        if let Some(kind) = descriptor.get("as").and_then(Value::as_str) {
            value = value.map(|v| coerce(kind, v));
        }

        value
    })
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

async fn select_source(descriptor: &Value, context: &Context) -> Option<Value> {
    if let Some(text) = descriptor.as_str() {
        if text.starts_with('/') {
            return pointer::get(&context.source, text).cloned();
        }
        if text.contains("../") {
            let absolute = scope::resolve(&context.paths.source, &[text]);
            return pointer::get(&context.input, &absolute).cloned();
        }
        // Un-rooted strings read as rooted pointers.
        return pointer::get(&context.source, text).cloned();
    }

    if let Some(p) = descriptor.get("source").and_then(Value::as_str) {
        return pointer::get(&context.source, p).cloned();
    }
    if let Some(p) = descriptor.get("target").and_then(Value::as_str) {
        let target = context.target_snapshot();
        return pointer::get(&target, p).cloned();
    }
    if let Some(p) = descriptor.get("input").and_then(Value::as_str) {
        return pointer::get(&context.input, p).cloned();
    }
    if let Some(p) = descriptor.get("output").and_then(Value::as_str) {
        let output = context.output_snapshot();
        return pointer::get(&output, p).cloned();
    }

    if let Some(list) = descriptor.get("first").and_then(Value::as_array) {
        let results = fan_out(list.clone(), context).await;
        return results.into_iter().find(Option::is_some).flatten();
    }
    if let Some(list) = descriptor.get("last").and_then(Value::as_array) {
        let results = fan_out(list.clone(), context).await;
        return results.into_iter().rev().find(Option::is_some).flatten();
    }
    if let Some(list) = descriptor.get("all").and_then(Value::as_array) {
        let results = fan_out(list.clone(), context).await;
        return Some(Value::Array(results.into_iter().flatten().collect()));
    }

    Some((*context.source).clone())
}

/// Evaluate sibling descriptors concurrently and join in order.
async fn fan_out(list: Vec<Value>, context: &Context) -> Vec<Option<Value>> {
    let futures: Vec<_> = list
        .into_iter()
        .map(|d| evaluator::read(d, context.clone(), Changes::default()))
        .collect();
    join_all(futures).await
}

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

async fn apply_switch(
    switch: &Value,
    value: Option<Value>,
    context: &Context,
) -> Option<Value> {
    let branch: Option<Value> = if let Some(p) = switch.get("source").and_then(Value::as_str) {
        value.as_ref().and_then(|v| pointer::get(v, p)).cloned()
    } else if let Some(p) = switch.get("input").and_then(Value::as_str) {
        pointer::get(&context.input, p).cloned()
    } else if let Some(p) = switch.get("output").and_then(Value::as_str) {
        let output = context.output_snapshot();
        pointer::get(&output, p).cloned()
    } else {
        None
    };

    let cases = switch.get("cases").and_then(Value::as_object)?;
    let chosen = branch
        .as_ref()
        .and_then(|b| cases.get(&stringify(b)))
        .or_else(|| cases.get("default"))?
        .clone();

    let changes = Changes {
        source: value,
        ..Changes::default()
    };
    evaluator::read(chosen, context.clone(), changes).await
}

// ---------------------------------------------------------------------------
// Stage helpers
// ---------------------------------------------------------------------------

fn apply_transformer(
    name: &str,
    value: Option<Value>,
    context: &Context,
    options: Option<&Value>,
) -> Option<Value> {
    match context.registries.transformer_named(name) {
        Some(transformer) => transformer(value, context, options),
        None => {
            tracing::debug!(transformer = %name, "unknown transformer, skipping");
            value
        }
    }
}

/// Pick from an array. `unique` selections are capped at the array length,
/// so over-asking cannot loop.
fn pick_random(items: &[Value], count: u64, unique: bool) -> Option<Value> {
    use rand::Rng;

    if items.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    if count <= 1 {
        return Some(items[rng.random_range(0..items.len())].clone());
    }
    if unique {
        let n = (count as usize).min(items.len());
        let mut pool: Vec<Value> = items.to_vec();
        for i in 0..n {
            let j = rng.random_range(i..pool.len());
            pool.swap(i, j);
        }
        pool.truncate(n);
        return Some(Value::Array(pool));
    }
    Some(Value::Array(
        (0..count)
            .map(|_| items[rng.random_range(0..items.len())].clone())
            .collect(),
    ))
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("literal pattern"))
}

/// Substitute `{{name}}` occurrences from the parameter object; missing
/// parameters render empty.
fn render_template(template: &str, params: Option<&Value>) -> String {
    template_pattern()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            params
                .and_then(|p| p.get(&caps[1]))
                .map(|v| stringify(v))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Strings render bare, everything else as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce(kind: &str, value: Value) -> Value {
    match kind {
        "string" => Value::String(stringify(&value)),
        "number" => match value {
            Value::Number(_) => value,
            Value::String(s) => {
                let text = s.trim();
                if let Ok(whole) = text.parse::<i64>() {
                    Value::from(whole)
                } else if let Ok(real) = text.parse::<f64>() {
                    serde_json::Number::from_f64(real)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
            Value::Bool(b) => Value::from(if b { 1 } else { 0 }),
            _ => Value::Null,
        },
        "boolean" => Value::Bool(truthy(&value)),
        "json" => Value::String(serde_json::to_string(&value).unwrap_or_default()),
        _ => value,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_template_substitutes_and_blanks_missing() {
        let params = json!({ "first": "Grace", "last": "Hopper", "n": 3 });
        assert_eq!(
            render_template("{{first}} {{last}} #{{n}}{{missing}}", Some(&params)),
            "Grace Hopper #3"
        );
    }

    #[test]
    fn test_stringify_strings_render_bare() {
        assert_eq!(stringify(&json!("x")), "x");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(null)), "null");
        assert_eq!(stringify(&json!({ "a": 1 })), r#"{"a":1}"#);
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce("number", json!("42")), json!(42));
        assert_eq!(coerce("number", json!("4.5")), json!(4.5));
        assert_eq!(coerce("number", json!(true)), json!(1));
        assert_eq!(coerce("number", json!("nope")), json!(null));
    }

    #[test]
    fn test_coerce_boolean_and_string_and_json() {
        assert_eq!(coerce("boolean", json!("")), json!(false));
        assert_eq!(coerce("boolean", json!("x")), json!(true));
        assert_eq!(coerce("string", json!(7)), json!("7"));
        assert_eq!(coerce("json", json!({ "a": 1 })), json!(r#"{"a":1}"#));
    }

    #[test]
    fn test_pick_random_unique_caps_at_length() {
        let items = vec![json!(1), json!(2), json!(3)];
        let picked = pick_random(&items, 10, true).unwrap();
        let picked = picked.as_array().unwrap();
        assert_eq!(picked.len(), 3);
        for item in picked {
            assert!(items.contains(item));
        }
    }

    #[test]
    fn test_pick_random_single() {
        let items = vec![json!("only")];
        assert_eq!(pick_random(&items, 1, false), Some(json!("only")));
        assert_eq!(pick_random(&[], 1, false), None);
    }

    #[test]
    fn test_pick_random_with_replacement_length() {
        let items = vec![json!(1), json!(2)];
        let picked = pick_random(&items, 5, false).unwrap();
        assert_eq!(picked.as_array().unwrap().len(), 5);
    }
}
