//! Mapping evaluation: `map` walks a mapping's pairings and assigns derived
//! values into the target; `nest` recurses into a sub-mapping with a fresh
//! target; `read` dispatches a reference to either.
//!
//! Pairings of one mapping run sequentially in source order, because each
//! pairing observes the shared error list and aborts the mapping when it is
//! non-empty. Fan-outs over array elements and disjunction variants run
//! concurrently and join before anything is written, so partial state is
//! never observable in the target.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::context::{self, Changes, Context, SharedDoc};
use crate::descriptor::{self, truthy};
use crate::pipeline;
use crate::pointer;

/// Evaluate a mapping descriptor, writing into the context's target.
///
/// Returns `None` when the reference is an unresolvable `$ref` or when the
/// mapping aborted on accumulated errors; otherwise a snapshot of the
/// target it populated.
pub(crate) fn map(
    reference: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Option<Value>> {
    Box::pin(async move {
        let descriptor = match descriptor::deref(&reference, &parent.library) {
            Some(d) => d,
            None => return None,
        };
        let context = context::shift(&descriptor, &parent, changes);

        // The seed value: mappings reuse the leaf source-selection keys, so
        // a mapping with no selection keys seeds from the current source.
        let seed = pipeline::evaluate(descriptor.clone(), context.clone()).await;

        let pairings = context.pairings.clone();
        for (left, right_reference) in pairings {
            let Some(right) = descriptor::deref(&right_reference, &context.library) else {
                continue;
            };
            let child = context::shift(
                &right,
                &context,
                Changes {
                    source: seed.clone(),
                    ..Changes::default()
                },
            );

            if descriptor::is_mapping(&right) || right.get("switch").is_some() {
                project(&right, &left, &context, child).await;
            } else if let Value::Array(variants) = &right {
                // Disjunction: evaluate variants concurrently, first truthy
                // result wins.
                let futures: Vec<_> = variants
                    .iter()
                    .cloned()
                    .map(|variant| read(variant, child.clone(), Changes::default()))
                    .collect();
                let results = join_all(futures).await;
                if let Some(value) = results.into_iter().flatten().find(truthy) {
                    write(&context.target, &left, value);
                }
            } else if let Some(value) = pipeline::evaluate(right.clone(), child).await {
                write(&context.target, &left, value);
            }

            if context.has_errors() {
                return None;
            }
        }

        emit_stdout(&descriptor, &context);

        Some(context.target_snapshot())
    })
}

/// Project a mapping-shaped (or `switch`-carrying) right descriptor.
///
/// Scalars write as-is; a non-empty array nests per element with the index
/// recorded in the source scope; a non-null object nests once.
async fn project(right: &Value, left: &str, context: &Context, child: Context) {
    let value = pipeline::evaluate(right.clone(), child.clone()).await;
    match value {
        None => {}
        Some(Value::Array(items)) if items.is_empty() => {
            write(&context.target, left, json!([]));
        }
        Some(Value::Array(items)) => {
            let futures: Vec<_> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    nest(
                        right.clone(),
                        child.clone(),
                        Changes {
                            source: Some(item),
                            target: None,
                            index: Some(index),
                        },
                    )
                })
                .collect();
            let nested = join_all(futures).await;
            let collected: Vec<Value> = nested
                .into_iter()
                .map(|item| item.unwrap_or(Value::Null))
                .collect();
            write(&context.target, left, Value::Array(collected));
        }
        Some(object @ Value::Object(_)) => {
            let nested = nest(
                right.clone(),
                child,
                Changes {
                    source: Some(object),
                    ..Changes::default()
                },
            )
            .await;
            if let Some(value) = nested {
                write(&context.target, left, value);
            }
        }
        Some(scalar) => write(&context.target, left, scalar),
    }
}

/// Recurse into a descriptor's sub-mapping against a fresh target.
///
/// Without a sub-mapping the source passes through as-is.
pub(crate) fn nest(
    descriptor: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Option<Value>> {
    Box::pin(async move {
        let sub = descriptor::sub_mapping(&descriptor)
            .and_then(|sub| descriptor::deref(sub, &parent.library));
        match sub {
            Some(sub) => {
                let wrapper = json!({ "source": "/", "mapping": sub });
                let fresh: SharedDoc = Arc::new(Mutex::new(json!({})));
                map(
                    wrapper,
                    parent,
                    Changes {
                        target: Some(fresh),
                        ..changes
                    },
                )
                .await
            }
            None => match changes.source {
                Some(source) => Some(source),
                None => Some((*parent.source).clone()),
            },
        }
    })
}

/// Dispatch a reference: mappings evaluate against a fresh target, leaves
/// through the value pipeline in the parent context.
///
/// A string reference is a mapping only when it names a registered `$id`;
/// otherwise it reads as a pointer.
pub(crate) fn read(
    reference: Value,
    parent: Context,
    changes: Changes,
) -> BoxFuture<'static, Option<Value>> {
    Box::pin(async move {
        let Some(resolved) = descriptor::deref(&reference, &parent.library) else {
            return None;
        };
        if descriptor::is_mapping(&resolved) {
            let fresh: SharedDoc = Arc::new(Mutex::new(json!({})));
            map(
                resolved,
                parent,
                Changes {
                    target: Some(fresh),
                    ..changes
                },
            )
            .await
        } else {
            let context = match changes.source {
                Some(source) => {
                    let mut shifted = parent.clone();
                    shifted.source = Arc::new(source);
                    shifted
                }
                None => parent,
            };
            pipeline::evaluate(resolved, context).await
        }
    })
}

fn write(target: &SharedDoc, pointer_str: &str, value: Value) {
    pointer::set(&mut target.lock(), pointer_str, value);
}

/// The `stdout` side channel: a string pointer prints that view of the
/// target, any other truthy value prints the whole target.
fn emit_stdout(descriptor: &Value, context: &Context) {
    match descriptor.get("stdout") {
        Some(Value::String(p)) => {
            let target = context.target_snapshot();
            let view = pointer::get(&target, p).cloned().unwrap_or(Value::Null);
            context.sink.emit(&pretty(&view));
        }
        Some(flag) if truthy(flag) => {
            context.sink.emit(&pretty(&context.target_snapshot()));
        }
        _ => {}
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
