//! JSON flattening.
//!
//! Expected templates and retrieved log bodies are both turned into a
//! [`FlatRecord`], a path→value table, so they can be compared key by key.

use serde::de::Error as _;
use serde_json::{Map, Value};

use crate::path::{lookup_segments, render_flat_key, FieldPath, Segment};

/// How arrays are treated while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlattenMode {
    /// Arrays are exploded into indexed keys (`a[0].b`).
    #[default]
    Exploded,
    /// Arrays are kept as values; object elements are flattened in place.
    KeepArrays,
}

/// A flattened JSON document, keyed by flattened path in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    fields: Map<String, Value>,
}

impl FlatRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value under a flattened key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Returns the value stored under exactly this key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns true if exactly this key is stored.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Resolves a key, descending into kept arrays for indexed paths.
    ///
    /// `body.input.messages[0].role` resolves either as a stored key or via
    /// a stored `body.input.messages` array whose first element holds `role`.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(key) {
            return Some(value);
        }
        let path = FieldPath::parse_flat_key(key).ok()?;
        resolve_in(&self.fields, path.segments())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for FlatRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Flattens a JSON value.
#[must_use]
pub fn flatten(value: &Value, mode: FlattenMode) -> FlatRecord {
    let mut fields = Map::new();
    let mut path = FieldPath::root();
    flatten_into(value, &mut path, mode, &mut fields);
    FlatRecord { fields }
}

/// Parses and flattens a JSON document.
///
/// # Errors
///
/// Returns an error if `text` is not valid JSON.
pub fn flatten_str(text: &str, mode: FlattenMode) -> serde_json::Result<FlatRecord> {
    let value: Value = serde_json::from_str(text)?;
    Ok(flatten(&value, mode))
}

/// Parses a document describing one or more records.
///
/// A top-level array yields one record per element, in order; a top-level
/// object yields a single record.
///
/// # Errors
///
/// Returns an error if `text` is not valid JSON or an entry is not an object.
pub fn flatten_entries(text: &str, mode: FlattenMode) -> serde_json::Result<Vec<FlatRecord>> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if item.is_object() {
                    Ok(flatten(item, mode))
                } else {
                    Err(serde_json::Error::custom(format!(
                        "entry {i} is not a JSON object"
                    )))
                }
            })
            .collect(),
        Value::Object(_) => Ok(vec![flatten(&value, mode)]),
        _ => Err(serde_json::Error::custom(
            "expected a JSON object or array of objects",
        )),
    }
}

/// Renders a value the way it is compared against a pattern.
///
/// Strings are used verbatim; everything else is compact JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_into(value: &Value, path: &mut FieldPath, mode: FlattenMode, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                path.push_key(key.as_str());
                flatten_into(child, path, mode, out);
                path.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => match mode {
            FlattenMode::Exploded => {
                for (index, child) in items.iter().enumerate() {
                    path.push_index(index);
                    flatten_into(child, path, mode, out);
                    path.pop();
                }
            }
            FlattenMode::KeepArrays => {
                let kept = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(_) => Value::Object(flatten(item, mode).into_map()),
                        other => other.clone(),
                    })
                    .collect();
                out.insert(path.to_flat_key(), Value::Array(kept));
            }
        },
        leaf => {
            out.insert(path.to_flat_key(), leaf.clone());
        }
    }
}

fn resolve_in<'a>(fields: &'a Map<String, Value>, segments: &[Segment]) -> Option<&'a Value> {
    for split in (1..segments.len()).rev() {
        let (head, tail) = segments.split_at(split);
        let Some(Value::Array(items)) = fields.get(&render_flat_key(head)) else {
            continue;
        };
        let Some((Segment::Index(index), rest)) = tail.split_first() else {
            continue;
        };
        let item = items.get(*index)?;
        if rest.is_empty() {
            return Some(item);
        }
        return match item {
            Value::Object(inner) => inner
                .get(&render_flat_key(rest))
                .or_else(|| resolve_in(inner, rest)),
            Value::Array(_) => lookup_segments(rest, item),
            _ => None,
        };
    }
    None
}
