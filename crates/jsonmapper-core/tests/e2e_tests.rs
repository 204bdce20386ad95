//! End-to-end scenarios exercised through the public `Mapper` API only.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use jsonmapper_core::{Context, MapOutcome, Mapper, Registries, StdoutSink, ViolationKind};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn map_one(mapping: Value, input: Value) -> MapOutcome {
    Mapper::new(&json!({}), Registries::new())
        .expect("empty mapper")
        .map(&mapping, input, None)
        .await
        .expect("evaluation")
}

// ── Basic projection ────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_pointer_copy() {
    let outcome = map_one(
        json!({ "mapping": { "/name": "/user/name" } }),
        json!({ "user": { "name": "Ada" } }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "name": "Ada" }));
    assert!(outcome.valid);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn each_projects_every_element() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/titles": { "source": "/books", "each": { "mapping": { "/t": "/title" } } }
            }
        }),
        json!({ "books": [{ "title": "A" }, { "title": "B" }] }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "titles": [{ "t": "A" }, { "t": "B" }] }));
}

#[tokio::test]
async fn nested_mapping_projects_object() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/person": {
                    "source": "/user",
                    "mapping": { "/n": "/name", "/a": "/age" }
                }
            }
        }),
        json!({ "user": { "name": "Ada", "age": 36 } }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "person": { "n": "Ada", "a": 36 } }));
}

#[tokio::test]
async fn each_over_empty_array_writes_empty_array() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/titles": { "source": "/books", "each": { "mapping": { "/t": "/title" } } }
            }
        }),
        json!({ "books": [] }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "titles": [] }));
}

// ── Selection ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_picks_first_defined_value() {
    let outcome = map_one(
        json!({ "mapping": { "/v": { "first": ["/a", "/b", { "constant": "fallback" }] } } }),
        json!({ "b": 7 }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "v": 7 }));
}

#[tokio::test]
async fn first_exhausted_writes_nothing() {
    let outcome = map_one(
        json!({ "mapping": { "/v": { "first": ["/a", "/b"] } } }),
        json!({}),
    )
    .await;

    assert_eq!(outcome.output, json!({}));
    assert!(outcome.valid);
}

#[tokio::test]
async fn last_and_all_collect_defined_values() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/last": { "last": ["/a", "/b", "/missing"] },
                "/all": { "all": ["/a", "/missing", "/b"] }
            }
        }),
        json!({ "a": 1, "b": 2 }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "last": 2, "all": [1, 2] }));
}

#[tokio::test]
async fn switch_selects_case_by_branch_value() {
    let mapping = json!({
        "mapping": {
            "/kind": {
                "switch": {
                    "source": "/type",
                    "cases": {
                        "book": { "constant": "readable" },
                        "default": { "constant": "other" }
                    }
                }
            }
        }
    });

    let book = map_one(mapping.clone(), json!({ "type": "book" })).await;
    assert_eq!(book.output, json!({ "kind": "readable" }));

    let cd = map_one(mapping, json!({ "type": "cd" })).await;
    assert_eq!(cd.output, json!({ "kind": "other" }));
}

#[tokio::test]
async fn switch_without_match_or_default_writes_nothing() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/kind": {
                    "switch": { "source": "/type", "cases": { "book": { "constant": "x" } } }
                }
            }
        }),
        json!({ "type": "cd" }),
    )
    .await;

    assert_eq!(outcome.output, json!({}));
}

#[tokio::test]
async fn find_selects_matching_element() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/name": { "source": "/items", "find": { "eq": { "id": 2 }, "pointer": "/name" } }
            }
        }),
        json!({ "items": [{ "id": 1, "name": "x" }, { "id": 2, "name": "y" }] }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "name": "y" }));
}

#[tokio::test]
async fn relative_pointer_reads_from_input_scope() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/out": { "source": "/wrap", "mapping": { "/sibling": "../top" } }
            }
        }),
        json!({ "top": "T", "wrap": { "inner": 1 } }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "out": { "sibling": "T" } }));
}

#[tokio::test]
async fn target_key_reads_back_earlier_writes() {
    let outcome = map_one(
        json!({ "mapping": { "/a": "/x", "/b": { "target": "/a" } } }),
        json!({ "x": 5 }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "a": 5, "b": 5 }));
}

// ── Validation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_failure_short_circuits_the_mapping() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/n": { "source": "/n", "type": "integer", "minimum": 10 },
                "/later": { "constant": "never" }
            }
        }),
        json!({ "n": 3 }),
    )
    .await;

    assert!(!outcome.valid);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(
        outcome.errors[0].kind,
        ViolationKind::Minimum { minimum: 10.0 }
    );
    assert_eq!(outcome.errors[0].source.as_deref(), Some("/n"));
    // The failing pairing still wrote; the following pairing never ran.
    assert_eq!(outcome.output, json!({ "n": 3 }));
}

#[tokio::test]
async fn required_records_error_but_default_still_fills() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/v": { "source": "/missing", "required": true, "default": "dflt" }
            }
        }),
        json!({}),
    )
    .await;

    assert!(!outcome.valid);
    assert_eq!(outcome.errors[0].kind, ViolationKind::Required);
    // Validation ran against the absent value, then default applied.
    assert_eq!(outcome.output, json!({ "v": "dflt" }));
}

// ── Inheritance ─────────────────────────────────────────────────────────────

fn extend_fixtures() -> (Value, Value) {
    (
        json!({ "$id": "P", "mapping": { "/a": "/a", "/b": "/b" } }),
        json!({
            "$id": "C",
            "$extend": "P",
            "mapping": { "/b": { "constant": 1 }, "/c": "/c" }
        }),
    )
}

#[tokio::test]
async fn extend_merges_with_stable_key_order() {
    let (parent, child) = extend_fixtures();
    let outcome = map_one(
        json!({ "mappings": [parent, child] }),
        json!({ "a": "x", "b": "y", "c": "z" }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "a": "x", "b": 1, "c": "z" }));
    let keys: Vec<&String> = outcome.output.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["a", "b", "c"]);
}

#[tokio::test]
async fn registered_mapping_evaluates_by_name() {
    let (parent, child) = extend_fixtures();
    let mapper = Mapper::new(
        &json!({ "mappings": [parent, child] }),
        Registries::new(),
    )
    .unwrap();

    let outcome = mapper
        .map(&json!("C"), json!({ "a": "x", "b": "y", "c": "z" }), None)
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "a": "x", "b": 1, "c": "z" }));
}

#[tokio::test]
async fn ref_descriptor_projects_registered_mapping() {
    let mapper = Mapper::new(
        &json!({ "mappings": [{ "$id": "person", "mapping": { "/n": "/name" } }] }),
        Registries::new(),
    )
    .unwrap();

    let outcome = mapper
        .map(
            &json!({ "mapping": { "/who": { "$ref": "person" } } }),
            json!({ "name": "Ada" }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.output, json!({ "who": { "n": "Ada" } }));

    let missing = mapper
        .map(
            &json!({ "mapping": { "/who": { "$ref": "nobody" } } }),
            json!({ "name": "Ada" }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(missing.output, json!({}));
}

// ── Template ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn template_substitutes_sub_mapping_parameters() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/full": {
                    "template": "{{first}} {{last}}",
                    "mapping": { "/first": "/f", "/last": "/l" }
                }
            }
        }),
        json!({ "f": "Grace", "l": "Hopper" }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "full": "Grace Hopper" }));
}

// ── Registries ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn plugins_run_in_descriptor_key_order() {
    let registries = Registries::new()
        .plugin("exclaim", |_sub: Value, value: Option<Value>, _cx: Context| async move {
            value.map(|v| json!(format!("{}!", v.as_str().unwrap_or_default())))
        })
        .plugin("question", |_sub: Value, value: Option<Value>, _cx: Context| async move {
            value.map(|v| json!(format!("{}?", v.as_str().unwrap_or_default())))
        });
    let mapper = Mapper::new(&json!({}), registries).unwrap();

    let outcome = mapper
        .map(
            &json!({
                "mapping": {
                    "/v": { "source": "/word", "question": true, "exclaim": true }
                }
            }),
            json!({ "word": "hm" }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "v": "hm?!" }));
}

#[tokio::test]
async fn plugin_result_projected_through_pointer() {
    let registries = Registries::new().plugin(
        "lookup",
        |_sub: Value, _value: Option<Value>, _cx: Context| async move {
            Some(json!({ "inner": { "deep": 42 } }))
        },
    );
    let mapper = Mapper::new(&json!({}), registries).unwrap();

    let outcome = mapper
        .map(
            &json!({ "mapping": { "/v": { "lookup": { "pointer": "/inner/deep" } } } }),
            json!({}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "v": 42 }));
}

#[tokio::test]
async fn initializer_seeds_missing_value() {
    let registries = Registries::new().initializer(
        "seed",
        |value: Option<Value>, _cx: &Context| value.or(Some(json!("seeded"))),
    );
    let mapper = Mapper::new(&json!({}), registries).unwrap();

    let outcome = mapper
        .map(
            &json!({ "mapping": { "/v": { "source": "/missing", "init": "seed" } } }),
            json!({}),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "v": "seeded" }));
}

#[tokio::test]
async fn unknown_registry_names_are_no_ops() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/v": { "source": "/x", "init": "nope", "transform": "missing" }
            }
        }),
        json!({ "x": 1 }),
    )
    .await;

    assert_eq!(outcome.output, json!({ "v": 1 }));
    assert!(outcome.valid);
}

#[tokio::test]
async fn transform_folds_string_and_option_steps() {
    let registries = Registries::new()
        .transformer(
            "upper",
            |value: Option<Value>, _cx: &Context, _opts: Option<&Value>| {
                value.map(|v| json!(v.as_str().unwrap_or_default().to_uppercase()))
            },
        )
        .transformer(
            "append",
            |value: Option<Value>, _cx: &Context, opts: Option<&Value>| {
                let suffix = opts
                    .and_then(|o| o.get("suffix"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                value.map(|v| json!(format!("{}{}", v.as_str().unwrap_or_default(), suffix)))
            },
        );
    let mapper = Mapper::new(&json!({}), registries).unwrap();

    let outcome = mapper
        .map(
            &json!({
                "mapping": {
                    "/v": {
                        "source": "/word",
                        "transform": ["upper", { "append": { "suffix": "!" } }]
                    }
                }
            }),
            json!({ "word": "hi" }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "v": "HI!" }));
}

// ── Façade shape ────────────────────────────────────────────────────────────

#[tokio::test]
async fn array_input_is_rewrapped_under_items() {
    let outcome = map_one(
        json!({ "mapping": { "/t": "/title" } }),
        json!([{ "title": "A" }, { "title": "B" }]),
    )
    .await;

    assert_eq!(outcome.output, json!({ "items": [{ "t": "A" }, { "t": "B" }] }));
}

#[tokio::test]
async fn initial_seeds_the_output_document() {
    let mapper = Mapper::new(&json!({}), Registries::new()).unwrap();
    let outcome = mapper
        .map(
            &json!({ "mapping": { "/b": "/b" } }),
            json!({ "b": 2 }),
            Some(json!({ "a": 1 })),
        )
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({ "a": 1, "b": 2 }));
}

#[tokio::test]
async fn bare_pairings_object_is_wrapped_as_mapping() {
    let outcome = map_one(json!({ "/name": "/user/name" }), json!({ "user": { "name": "Ada" } })).await;
    assert_eq!(outcome.output, json!({ "name": "Ada" }));
}

// ── Stdout side channel ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn stdout_pointer_prints_target_view() {
    let buffer = CaptureBuffer::default();
    let mapper = Mapper::new(&json!({}), Registries::new())
        .unwrap()
        .with_stdout(StdoutSink::from_writer(buffer.clone()));

    mapper
        .map(
            &json!({ "stdout": "/name", "mapping": { "/name": "/user/name" } }),
            json!({ "user": { "name": "Ada" } }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(buffer.contents(), "\"Ada\"\n");
}

#[tokio::test]
async fn stdout_truthy_prints_whole_target() {
    let buffer = CaptureBuffer::default();
    let mapper = Mapper::new(&json!({}), Registries::new())
        .unwrap()
        .with_stdout(StdoutSink::from_writer(buffer.clone()));

    mapper
        .map(
            &json!({ "stdout": true, "mapping": { "/name": "/user/name" } }),
            json!({ "user": { "name": "Ada" } }),
            None,
        )
        .await
        .unwrap();

    assert_eq!(buffer.contents(), "{\n  \"name\": \"Ada\"\n}\n");
}

// ── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn pure_descriptors_evaluate_idempotently() {
    let mapper = Mapper::new(&json!({}), Registries::new()).unwrap();
    let descriptor = json!({
        "mapping": {
            "/name": "/user/name",
            "/kind": { "switch": { "source": "/t", "cases": { "default": { "constant": 1 } } } },
            "/age": { "source": "/user/age", "type": "integer" }
        }
    });
    let input = json!({ "user": { "name": "Ada", "age": 36 }, "t": "x" });

    let once = mapper.map(&descriptor, input.clone(), None).await.unwrap();
    let twice = mapper.map(&descriptor, input, None).await.unwrap();

    assert_eq!(once.output, twice.output);
    assert_eq!(once.errors, twice.errors);
}

#[tokio::test]
async fn as_json_round_trips_through_parse() {
    let original = json!({ "deep": { "list": [1, 2, 3] } });
    let outcome = map_one(
        json!({ "mapping": { "/enc": { "source": "/obj", "as": "json" } } }),
        json!({ "obj": original.clone() }),
    )
    .await;

    let encoded = outcome.output["enc"].as_str().unwrap();
    let decoded: Value = serde_json::from_str(encoded).unwrap();
    assert_eq!(decoded, original);
}

#[tokio::test]
async fn random_unique_never_over_selects() {
    let outcome = map_one(
        json!({
            "mapping": {
                "/pick": { "source": "/xs", "random": 10, "unique": true }
            }
        }),
        json!({ "xs": [1, 2, 3] }),
    )
    .await;

    let picked = outcome.output["pick"].as_array().unwrap();
    assert_eq!(picked.len(), 3);
    for item in picked {
        assert!(json!([1, 2, 3]).as_array().unwrap().contains(item));
    }
}
