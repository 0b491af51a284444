//! Seams between the validator and its backends.
//!
//! - [`LogQueryService`] runs filter queries against a log store.
//! - [`TemplateRenderer`] turns an expectation template into JSON text.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{LogEvent, ValidationContext};

/// A log store that can answer filter-expression queries.
///
/// Implementations return matching events ingested at or after
/// `start_time`, at most `max_results` of them. Zero matches is an empty
/// list, not an error.
pub trait LogQueryService: Send + Sync {
    /// Runs one filter query against a log group.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried or the filter
    /// expression is rejected.
    fn filter_logs(
        &self,
        log_group: &str,
        filter_expression: &str,
        start_time: DateTime<Utc>,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<LogEvent>>> + Send;
}

impl<Q: LogQueryService + ?Sized> LogQueryService for Arc<Q> {
    fn filter_logs(
        &self,
        log_group: &str,
        filter_expression: &str,
        start_time: DateTime<Utc>,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<LogEvent>>> + Send {
        (**self).filter_logs(log_group, filter_expression, start_time, max_results)
    }
}

/// Renders an expectation template with the run's context.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` into JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be rendered.
    fn render(&self, template: &str, context: &ValidationContext) -> Result<String>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &ValidationContext) -> Result<String> + Send + Sync,
{
    fn render(&self, template: &str, context: &ValidationContext) -> Result<String> {
        self(template, context)
    }
}
