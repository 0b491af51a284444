//! Attribute paths.
//!
//! One [`FieldPath`] has two spellings:
//!
//! - the flattened-key form used by expected templates and [`FlatRecord`]
//!   keys: `attributes["aws.local.operation"]`, `body.input.messages[0].role`
//! - the log-store query form used inside filter expressions:
//!   `$.attributes.['aws.local.operation']`, `$.body.input.messages[0].role`
//!
//! [`FlatRecord`]: crate::flatten::FlatRecord

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// A path that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path {path:?}: {reason}")]
pub struct PathError {
    /// The input that failed to parse.
    pub path: String,
    /// What was wrong with it.
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

/// A sequence of object keys and array indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Creates the empty (root) path.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Creates a path from its segments.
    #[must_use]
    pub const fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Appends an object key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(Segment::Key(key.into()));
        self
    }

    /// Appends an array index.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    /// Pushes a key in place.
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(Segment::Key(key.into()));
    }

    /// Pushes an index in place.
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    /// Removes the last segment.
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Renders the flattened-key form.
    #[must_use]
    pub fn to_flat_key(&self) -> String {
        render_flat_key(&self.segments)
    }

    /// Renders the log-store query form.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if is_plain_query_key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                Segment::Key(key) => {
                    out.push_str(".['");
                    push_escaped(&mut out, key, '\'');
                    out.push_str("']");
                }
                Segment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Parses the flattened-key form.
    ///
    /// # Errors
    ///
    /// Returns an error on unbalanced brackets or empty dotted segments.
    pub fn parse_flat_key(input: &str) -> Result<Self, PathError> {
        parse_segments(input, input, '"').map(Self::from_segments)
    }

    /// Parses the query form (must start with `$`).
    ///
    /// # Errors
    ///
    /// Returns an error if the `$` root is missing or the rest is malformed.
    pub fn parse_query(input: &str) -> Result<Self, PathError> {
        let Some(rest) = input.strip_prefix('$') else {
            return Err(PathError::new(input, "query paths start with '$'"));
        };
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }
        if rest.starts_with('.') {
            return Err(PathError::new(input, "empty segment"));
        }
        parse_segments(input, rest, '\'').map(Self::from_segments)
    }

    /// Looks the path up in a JSON document.
    #[must_use]
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        lookup_segments(&self.segments, document)
    }
}

impl From<&[Segment]> for FieldPath {
    fn from(segments: &[Segment]) -> Self {
        Self::from_segments(segments.to_vec())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

/// Renders segments in flattened-key form.
pub(crate) fn render_flat_key(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) if needs_flat_brackets(key) => {
                out.push_str("[\"");
                push_escaped(&mut out, key, '"');
                out.push_str("\"]");
            }
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

pub(crate) fn lookup_segments<'a>(segments: &[Segment], document: &'a Value) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(document, |current, segment| match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        })
}

fn needs_flat_brackets(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '"'])
}

fn is_plain_query_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn push_escaped(out: &mut String, value: &str, quote: char) {
    for c in value.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

fn parse_segments(original: &str, input: &str, quote: char) -> Result<Vec<Segment>, PathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut expect_key = true;

    while pos < chars.len() {
        match chars[pos] {
            '[' => {
                pos += 1;
                if chars.get(pos) == Some(&quote) {
                    pos += 1;
                    let mut key = String::new();
                    loop {
                        match chars.get(pos) {
                            Some('\\') => {
                                let Some(&escaped) = chars.get(pos + 1) else {
                                    return Err(PathError::new(original, "dangling escape"));
                                };
                                key.push(escaped);
                                pos += 2;
                            }
                            Some(&c) if c == quote => {
                                pos += 1;
                                break;
                            }
                            Some(&c) => {
                                key.push(c);
                                pos += 1;
                            }
                            None => return Err(PathError::new(original, "unterminated quote")),
                        }
                    }
                    segments.push(Segment::Key(key));
                } else {
                    let start = pos;
                    while chars.get(pos).is_some_and(char::is_ascii_digit) {
                        pos += 1;
                    }
                    let digits: String = chars[start..pos].iter().collect();
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| PathError::new(original, "expected array index"))?;
                    segments.push(Segment::Index(index));
                }
                if chars.get(pos) != Some(&']') {
                    return Err(PathError::new(original, "expected ']'"));
                }
                pos += 1;
                expect_key = false;
            }
            '.' => {
                if segments.is_empty() || expect_key {
                    return Err(PathError::new(original, "empty segment"));
                }
                pos += 1;
                match chars.get(pos) {
                    None => return Err(PathError::new(original, "trailing '.'")),
                    Some('[') => expect_key = false,
                    Some(_) => expect_key = true,
                }
            }
            _ if expect_key => {
                let start = pos;
                while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                    pos += 1;
                }
                segments.push(Segment::Key(chars[start..pos].iter().collect()));
                expect_key = false;
            }
            c => {
                return Err(PathError::new(
                    original,
                    format!("unexpected character {c:?}"),
                ));
            }
        }
    }

    Ok(segments)
}
