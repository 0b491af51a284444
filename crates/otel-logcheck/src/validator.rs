//! The validation driver.
//!
//! A [`LogValidator`] renders the expectation template, derives one
//! expected attribute set per entry, and then, for every entry in order,
//! classifies it, builds candidate filters, retrieves a record and matches
//! it. The whole per-entry loop is retried as a unit: any failure restarts
//! from the first entry on the next attempt.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::ValidatorConfig;
use crate::error::{Result, ValidationError};
use crate::expectation::{check_expectations, derive_expectations, ExpectedAttributeSet};
use crate::filter::FilterBuilder;
use crate::kind::LogKind;
use crate::matcher::match_attributes;
use crate::retrieval::Retriever;
use crate::retry::{retry_with_backoff, RetryExhausted, RetryOutcome};
use crate::template::PlaceholderRenderer;
use crate::traits::{LogQueryService, TemplateRenderer};
use crate::types::ValidationContext;

/// Summary of a passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Number of expected entries that were matched.
    pub entries: usize,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Wall time from the start of validation.
    pub elapsed: Duration,
}

/// Validates that expected log records reached a log store.
pub struct LogValidator<Q, R = PlaceholderRenderer> {
    context: ValidationContext,
    template: String,
    query_service: Q,
    renderer: R,
    config: ValidatorConfig,
}

impl<Q: LogQueryService> LogValidator<Q> {
    /// Creates a validator with the placeholder renderer and default config.
    #[must_use]
    pub fn new(context: ValidationContext, template: impl Into<String>, query_service: Q) -> Self {
        Self {
            context,
            template: template.into(),
            query_service,
            renderer: PlaceholderRenderer::new(),
            config: ValidatorConfig::default(),
        }
    }
}

impl<Q: LogQueryService, R: TemplateRenderer> LogValidator<Q, R> {
    /// Replaces the template renderer.
    #[must_use]
    pub fn with_renderer<R2: TemplateRenderer>(self, renderer: R2) -> LogValidator<Q, R2> {
        LogValidator {
            context: self.context,
            template: self.template,
            query_service: self.query_service,
            renderer,
            config: self.config,
        }
    }

    /// Replaces the log query service.
    #[must_use]
    pub fn with_query_service<Q2: LogQueryService>(self, query_service: Q2) -> LogValidator<Q2, R> {
        LogValidator {
            context: self.context,
            template: self.template,
            query_service,
            renderer: self.renderer,
            config: self.config,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the number of attempts.
    pub fn set_max_retry_count(&mut self, count: u32) {
        self.config.max_retry_count = count;
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Returns the validation context.
    #[must_use]
    pub const fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Returns the log query service.
    #[must_use]
    pub const fn query_service(&self) -> &Q {
        &self.query_service
    }

    /// Renders the template and derives the expected attribute sets.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails, no entries can be derived, or
    /// an entry is structurally invalid.
    pub fn expected_attributes(&self) -> Result<Vec<ExpectedAttributeSet>> {
        let rendered = self.renderer.render(&self.template, &self.context)?;
        let entries = derive_expectations(&rendered);
        check_expectations(&entries)?;
        Ok(entries)
    }

    /// Runs the validation.
    ///
    /// # Errors
    ///
    /// Template problems are returned as-is, without retrying. Once every
    /// attempt has failed, the first failure of the last attempt is
    /// returned inside [`ValidationError::RetriesExhausted`].
    pub async fn validate(&self) -> Result<ValidationReport> {
        let started = Instant::now();
        let entries = self.expected_attributes()?;
        let entries = entries.as_slice();

        info!(
            service = %self.context.service_name,
            log_group = %self.context.log_group,
            entries = entries.len(),
            max_attempts = self.config.max_retry_count,
            "validating logs"
        );

        let policy = self.config.retry_policy();
        let outcome = retry_with_backoff(&policy, move |attempt| {
            self.validate_entries(entries, attempt)
        })
        .await;

        match outcome {
            Ok(RetryOutcome { attempts, .. }) => {
                let report = ValidationReport {
                    entries: entries.len(),
                    attempts,
                    elapsed: started.elapsed(),
                };
                info!(
                    service = %self.context.service_name,
                    entries = report.entries,
                    attempts,
                    "log validation passed"
                );
                Ok(report)
            }
            Err(RetryExhausted { error, attempts }) => {
                let source = error.into_final();
                error!(
                    service = %self.context.service_name,
                    attempts,
                    error = %source,
                    "log validation failed"
                );
                Err(ValidationError::RetriesExhausted {
                    attempts,
                    elapsed: started.elapsed(),
                    source: Box::new(source),
                })
            }
        }
    }

    async fn validate_entries(&self, entries: &[ExpectedAttributeSet], attempt: u32) -> Result<()> {
        let retriever = Retriever::new(
            &self.query_service,
            &self.context.log_group,
            self.config.window(),
            self.config.max_results,
        );
        let builder = FilterBuilder::new(&self.context);

        for (index, expected) in entries.iter().enumerate() {
            let kind = LogKind::classify(expected);
            let candidates = builder.build(&kind);
            debug!(
                attempt,
                entry = index,
                kind = kind.name(),
                candidates = candidates.len(),
                "validating entry"
            );

            let found = retriever
                .fetch_first(&candidates, kind.flatten_mode())
                .await?;
            match_attributes(expected, &found.record).map_err(|e| e.with_filter(&found.filter))?;
        }
        Ok(())
    }
}
