//! RFC 6901 JSON Pointer reads and writes over `serde_json::Value`.
//!
//! Two deviations from the letter of the RFC, both part of the descriptor
//! language contract:
//!
//! - `"/"` addresses the document root (descriptors use it as the identity
//!   pointer and scopes default to it), not the empty-string key.
//! - Un-rooted pointers (`"name"`) are tolerated and treated as rooted.
//!
//! [`set`] creates intermediate containers on demand, inferring the
//! container type from the next token: a numeric token instantiates an
//! array, anything else an object.

use serde_json::Value;

/// One parsed token of a JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Integer index into an array. Against an object, the decimal string
    /// doubles as a property name.
    Index(usize),
    /// Property name, `~0`/`~1` already decoded. Never a plain integer.
    Property(String),
}

impl Token {
    fn parse(segment: &str) -> Token {
        // "+1" and zero-padded "01" are property names per RFC 6901.
        if segment.starts_with('+') || (segment.starts_with('0') && segment.len() > 1) {
            Token::Property(segment.to_string())
        } else if let Ok(index) = segment.parse::<usize>() {
            Token::Index(index)
        } else {
            Token::Property(segment.to_string())
        }
    }
}

/// A parsed JSON Pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pointer(pub Vec<Token>);

impl Pointer {
    /// Parse an encoded pointer string.
    ///
    /// `""` and `"/"` both produce the root pointer.
    pub fn parse(encoded: &str) -> Pointer {
        if encoded.is_empty() || encoded == "/" {
            return Pointer(Vec::new());
        }
        let tokens = encoded
            .split('/')
            .skip(if encoded.starts_with('/') { 1 } else { 0 })
            .map(|raw| Token::parse(&raw.replace("~1", "/").replace("~0", "~")))
            .collect();
        Pointer(tokens)
    }

    /// Whether this pointer addresses the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read the value at `pointer` inside `root`.
///
/// Returns `None` for any missing segment, never panics.
pub fn get<'v>(root: &'v Value, pointer: &str) -> Option<&'v Value> {
    let mut node = root;
    for token in &Pointer::parse(pointer).0 {
        node = match (node, token) {
            (Value::Object(map), Token::Property(name)) => map.get(name)?,
            (Value::Object(map), Token::Index(index)) => map.get(&index.to_string())?,
            (Value::Array(items), Token::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Write `value` at `pointer` inside `root`, creating intermediate
/// containers as needed.
///
/// Arrays are padded with `null` up to a written index. The write is
/// silently dropped when the document structure is incompatible with the
/// pointer (an existing scalar parent, or a property token against an
/// array).
pub fn set(root: &mut Value, pointer: &str, value: Value) {
    if let Some(slot) = locate_mut(root, &Pointer::parse(pointer)) {
        *slot = value;
    }
}

/// Navigate to a mutable slot, instantiating missing containers along the
/// way. `Null` parents become an object or array depending on the token.
fn locate_mut<'v>(root: &'v mut Value, pointer: &Pointer) -> Option<&'v mut Value> {
    let mut node = root;
    for token in &pointer.0 {
        if node.is_null() {
            *node = match token {
                Token::Property(_) => Value::Object(serde_json::Map::new()),
                Token::Index(_) => Value::Array(Vec::new()),
            };
        }
        node = match node {
            Value::Object(map) => match token {
                Token::Property(name) => map.entry(name.clone()).or_insert(Value::Null),
                Token::Index(index) => {
                    map.entry(index.to_string()).or_insert(Value::Null)
                }
            },
            Value::Array(items) => match token {
                Token::Index(index) => {
                    if *index >= items.len() {
                        items.resize(index + 1, Value::Null);
                    }
                    &mut items[*index]
                }
                Token::Property(_) => return None,
            },
            // Scalar parent: the pointer does not fit this document.
            _ => return None,
        };
    }
    Some(node)
}

// ===========================================================================
// Tests
// ===========================================================================
