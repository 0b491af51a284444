//! Error types for log validation.

use std::time::Duration;

use thiserror::Error;

/// Broad category of a validation failure.
///
/// Callers asserting on a failed run usually only care about this, not
/// about the retry wrapping around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No record was found, or a required key is absent from the record.
    ExpectedLogNotFound,
    /// The record has the key but its value does not match the pattern.
    DataModelMismatch,
    /// A single query returned nothing.
    EmptyResultSet,
    /// The expectation template itself is unusable.
    InvalidInput,
    /// The log store or its data could not be read.
    Backend,
}

/// Errors that can occur while validating logs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No record exists for an expectation, or a required key is missing.
    #[error("expected log not found{}", not_found_detail(.key, .filter))]
    ExpectedLogNotFound {
        /// The expected key missing from the retrieved record, if any.
        key: Option<String>,
        /// The filter expression that was attempted, if any.
        filter: Option<String>,
    },

    /// A key exists in the record but its value fails the regex check.
    #[error(
        "value for key {key} was expected to match {expected:?}, but actual was {actual:?}{}",
        filter_detail(.filter)
    )]
    DataModelMismatch {
        /// The flattened key that was compared.
        key: String,
        /// The expected pattern.
        expected: String,
        /// The stringified actual value.
        actual: String,
        /// The filter expression that selected the record, if known.
        filter: Option<String>,
    },

    /// The log query returned zero records.
    #[error("log query returned no results for filter: {filter}")]
    EmptyResultSet {
        /// The last filter expression tried.
        filter: String,
    },

    /// The rendered template produced no expected log entries.
    #[error("no expected log entries could be derived from the template")]
    NoExpectations,

    /// An expected entry is structurally invalid.
    #[error("invalid expectation: {0}")]
    InvalidExpectation(String),

    /// An expected value is not a valid regular expression.
    #[error("invalid pattern for key {key}: {source}")]
    InvalidPattern {
        /// The flattened key holding the pattern.
        key: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A filter expression could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A retrieved log message is not valid JSON.
    #[error("retrieved log is not valid JSON: {0}")]
    MalformedLog(#[source] serde_json::Error),

    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(String),

    /// The log query service reported a failure.
    #[error("log query failed: {0}")]
    Query(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt failed; carries the failure of the last one.
    #[error("validation failed after {attempts} attempt(s) in {elapsed:?}: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Wall time spent across all attempts.
        elapsed: Duration,
        /// The first failure of the final attempt.
        #[source]
        source: Box<ValidationError>,
    },
}

fn not_found_detail(key: &Option<String>, filter: &Option<String>) -> String {
    match (key, filter) {
        (Some(key), Some(_)) => format!(": key {key} does not exist{}", filter_detail(filter)),
        (Some(key), None) => format!(": key {key} does not exist"),
        (None, Some(filter)) => format!(" for filter: {filter}"),
        (None, None) => String::new(),
    }
}

fn filter_detail(filter: &Option<String>) -> String {
    filter
        .as_ref()
        .map_or_else(String::new, |filter| format!(" (filter: {filter})"))
}

impl ValidationError {
    /// Returns the failure category, looking through retry wrapping.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ExpectedLogNotFound { .. } => FailureKind::ExpectedLogNotFound,
            Self::DataModelMismatch { .. } => FailureKind::DataModelMismatch,
            Self::EmptyResultSet { .. } => FailureKind::EmptyResultSet,
            Self::NoExpectations
            | Self::InvalidExpectation(_)
            | Self::InvalidPattern { .. }
            | Self::Template(_)
            | Self::Config(_) => FailureKind::InvalidInput,
            Self::InvalidFilter(_) | Self::MalformedLog(_) | Self::Query(_) | Self::Io(_) => {
                FailureKind::Backend
            }
            Self::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    /// Converts the internal empty-result signal into the error reported
    /// once no attempts remain.
    #[must_use]
    pub fn into_final(self) -> Self {
        match self {
            Self::EmptyResultSet { filter } => Self::ExpectedLogNotFound {
                key: None,
                filter: Some(filter),
            },
            other => other,
        }
    }

    /// Records the filter expression that selected the record a match
    /// failure was found in. Other errors are returned unchanged.
    #[must_use]
    pub fn with_filter(self, selected_by: &str) -> Self {
        match self {
            Self::ExpectedLogNotFound { key, filter: None } => Self::ExpectedLogNotFound {
                key,
                filter: Some(selected_by.to_string()),
            },
            Self::DataModelMismatch {
                key,
                expected,
                actual,
                filter: None,
            } => Self::DataModelMismatch {
                key,
                expected,
                actual,
                filter: Some(selected_by.to_string()),
            },
            other => other,
        }
    }

    /// Shorthand for a missing-key failure.
    #[must_use]
    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::ExpectedLogNotFound {
            key: Some(key.into()),
            filter: None,
        }
    }
}

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
