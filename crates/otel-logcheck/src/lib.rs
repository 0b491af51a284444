//! # otel-logcheck
//!
//! Asserts that a telemetry pipeline delivered the expected log records to
//! a log store.
//!
//! An expectation template (JSON with `{{name}}` placeholders) describes
//! one or more log records. For each record the validator picks a log
//! kind, builds the matching filter expression, polls the store until a
//! record shows up, and compares it field by field against the expected
//! regex patterns.
//!
//! This crate provides:
//!
//! - [`LogValidator`] — The retrying validation driver
//! - [`LogKind`] — Classification of an expected record
//! - [`FilterExpression`] / [`FilterBuilder`] — Store filter expressions
//! - [`match_attributes`] — Field-by-field regex comparison
//! - [`MemoryLogStore`] / [`FileLogStore`] — Local [`LogQueryService`] backends
//! - [`PlaceholderRenderer`] — Default [`TemplateRenderer`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use otel_logcheck::{LogValidator, MemoryLogStore, ValidationContext, ValidatorConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> otel_logcheck::Result<()> {
//! let store = MemoryLogStore::new();
//! store.append_message(
//!     "/aws/application-signals/data",
//!     r#"{"Service": "orders", "Operation": "GET /items"}"#,
//! );
//!
//! let context = ValidationContext::new("orders", "/aws/application-signals/data");
//! let validator = LogValidator::new(
//!     context,
//!     r#"{"Service": "{{serviceName}}", "Operation": "GET /items"}"#,
//!     store,
//! )
//! .with_config(ValidatorConfig::default().with_retry_delay(Duration::from_secs(1)));
//!
//! let report = validator.validate().await?;
//! assert_eq!(report.entries, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod expectation;
pub mod file_store;
pub mod filter;
pub mod flatten;
pub mod kind;
pub mod matcher;
pub mod path;
pub mod retrieval;
pub mod retry;
pub mod store;
pub mod template;
pub mod traits;
pub mod types;
pub mod validator;

// Re-export main types
pub use config::ValidatorConfig;
pub use error::{FailureKind, Result, ValidationError};
pub use expectation::{check_expectations, derive_expectations, ExpectedAttributeSet};
pub use file_store::FileLogStore;
pub use filter::{Clause, FilterBuilder, FilterExpression, CUSTOM_LOG_BODY};
pub use flatten::{flatten, flatten_entries, flatten_str, stringify, FlatRecord, FlattenMode};
pub use kind::{ClassicSelector, LogKind, RemotePair, ResourcePair, SpanSelector};
pub use matcher::match_attributes;
pub use path::{FieldPath, PathError, Segment};
pub use retrieval::{Retrieved, Retriever};
pub use retry::{calculate_backoff, retry_with_backoff, RetryExhausted, RetryOutcome, RetryPolicy};
pub use store::MemoryLogStore;
pub use template::PlaceholderRenderer;
pub use traits::{LogQueryService, TemplateRenderer};
pub use types::{LogEvent, TimeWindow, ValidationContext};
pub use validator::{LogValidator, ValidationReport};
