//! Pointer scope composition.
//!
//! Scopes accumulate as the evaluator descends: each descriptor may offset
//! the current source/target root with its own pointer, and `each` inserts
//! the element index between the enclosing scope and the descriptor's
//! offset. Composition is POSIX-like: `.` is a no-op, `..` pops a segment,
//! repeated separators collapse.

/// Compose `segments` onto `base`, normalizing `.`, `..`, and `/`.
///
/// The result is always absolute; popping past the root stays at `"/"`.
pub fn resolve(base: &str, segments: &[&str]) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for part in std::iter::once(base).chain(segments.iter().copied()) {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    resolved.pop();
                }
                other => resolved.push(other),
            }
        }
    }
    if resolved.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", resolved.join("/"))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
