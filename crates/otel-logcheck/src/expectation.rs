//! Expected attribute sets derived from a rendered template.

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, ValidationError};
use crate::flatten::{flatten_entries, stringify, FlatRecord, FlattenMode};

/// Severity number key of an OTLP log record.
pub const SEVERITY_NUMBER: &str = "severityNumber";
/// Severity text key of an OTLP log record.
pub const SEVERITY_TEXT: &str = "severityText";
/// Prefix shared by every OTLP body key.
pub const BODY_PREFIX: &str = "body";

/// Local operation of a service/dependency log.
pub const OPERATION: &str = "Operation";
/// Remote service of a dependency log.
pub const REMOTE_SERVICE: &str = "RemoteService";
/// Remote operation of a dependency log.
pub const REMOTE_OPERATION: &str = "RemoteOperation";
/// Remote resource type of a dependency log.
pub const REMOTE_RESOURCE_TYPE: &str = "RemoteResourceType";
/// Remote resource identifier of a dependency log.
pub const REMOTE_RESOURCE_IDENTIFIER: &str = "RemoteResourceIdentifier";

/// Local operation span attribute.
pub const LOCAL_OPERATION_ATTR: &str = r#"attributes["aws.local.operation"]"#;
/// Remote service span attribute.
pub const REMOTE_SERVICE_ATTR: &str = r#"attributes["aws.remote.service"]"#;
/// Remote operation span attribute.
pub const REMOTE_OPERATION_ATTR: &str = r#"attributes["aws.remote.operation"]"#;

/// Values of these keys are copied verbatim into filter expressions.
const FILTER_LITERAL_KEYS: &[&str] = &[
    OPERATION,
    REMOTE_SERVICE,
    REMOTE_OPERATION,
    REMOTE_RESOURCE_TYPE,
    REMOTE_RESOURCE_IDENTIFIER,
    LOCAL_OPERATION_ATTR,
    REMOTE_SERVICE_ATTR,
    REMOTE_OPERATION_ATTR,
];

/// Characters with meaning in the log-store filter language.
const FILTER_SYNTAX_CHARS: &[char] = &['"', '{', '}', '%'];

/// One expected log record: flattened key → literal or regex pattern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedAttributeSet {
    record: FlatRecord,
}

impl ExpectedAttributeSet {
    /// Wraps a flattened record.
    #[must_use]
    pub const fn new(record: FlatRecord) -> Self {
        Self { record }
    }

    /// Returns the raw expected value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.record.get(key)
    }

    /// Returns the value of a key as filter text; `null` counts as absent.
    #[must_use]
    pub fn literal(&self, key: &str) -> Option<String> {
        match self.record.get(key)? {
            Value::Null => None,
            value => Some(stringify(value)),
        }
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.record.contains_key(key)
    }

    /// Returns true if any key starts with `prefix`.
    #[must_use]
    pub fn has_key_prefix(&self, prefix: &str) -> bool {
        self.record.keys().any(|key| key.starts_with(prefix))
    }

    /// Iterates expected entries in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.record.iter()
    }

    /// Returns the number of expected keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record.len()
    }

    /// Returns true if nothing is expected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ExpectedAttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Derives expected attribute sets from rendered template text.
///
/// Malformed text yields an empty list instead of an error; the caller
/// decides what an empty expectation list means.
#[must_use]
pub fn derive_expectations(rendered: &str) -> Vec<ExpectedAttributeSet> {
    match flatten_entries(rendered, FlattenMode::KeepArrays) {
        Ok(records) => records.into_iter().map(ExpectedAttributeSet::new).collect(),
        Err(e) => {
            warn!(error = %e, "rendered template is not a usable expectation document");
            Vec::new()
        }
    }
}

/// Checks template-author input before any query is made.
///
/// Rejects half-specified remote pairs, and warns about literals that
/// cannot be used safely both as filter text and as a regex.
pub fn check_expectations(entries: &[ExpectedAttributeSet]) -> Result<()> {
    if entries.is_empty() {
        return Err(ValidationError::NoExpectations);
    }

    for (index, entry) in entries.iter().enumerate() {
        // A lone resource half is treated as an absent resource pair.
        require_pair(index, entry, REMOTE_SERVICE, REMOTE_OPERATION)?;

        for key in FILTER_LITERAL_KEYS {
            if let Some(value) = entry.literal(key) {
                flag_literal(index, key, &value);
            }
        }
    }

    info!(entries = entries.len(), "expectations checked");
    Ok(())
}

fn require_pair(index: usize, entry: &ExpectedAttributeSet, first: &str, second: &str) -> Result<()> {
    match (entry.literal(first), entry.literal(second)) {
        (Some(_), None) | (None, Some(_)) => Err(ValidationError::InvalidExpectation(format!(
            "entry {index}: {first} and {second} must be given together"
        ))),
        _ => Ok(()),
    }
}

fn flag_literal(index: usize, key: &str, value: &str) {
    if value.contains(FILTER_SYNTAX_CHARS) {
        warn!(
            entry = index,
            key,
            value,
            "literal contains filter syntax characters"
        );
    } else if regex::escape(value) != value {
        warn!(
            entry = index,
            key,
            value,
            "literal contains regex metacharacters; filter and match may disagree"
        );
    }
}
