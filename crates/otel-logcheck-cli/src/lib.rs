//! # otel-logcheck-cli
//!
//! Command-line front end for [`otel_logcheck`].
//!
//! Reads an expectation template, polls a directory of JSON-lines log
//! groups through [`otel_logcheck::FileLogStore`], and reports whether the
//! expected records arrived.
//!
//! ```text
//! otel-logcheck --template expected.json --log-dir ./logs \
//!     --service-name orders --log-group /aws/application-signals/data
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod output;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use otel_logcheck::{FileLogStore, LogValidator, ValidationContext, ValidatorConfig};

pub use cli::{Cli, Format};
pub use error::CliError;
pub use output::{OutputFormat, ReportOutput};

/// Runs one validation and writes the report to `out`.
///
/// # Errors
///
/// Returns [`CliError::Validation`] if the logs do not validate, and
/// other variants if the invocation itself is unusable.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<(), CliError> {
    let config = load_config(cli).map_err(|e| CliError::Config(format!("{e:#}")))?;
    let template = read_template(&cli.template).map_err(|e| CliError::Config(format!("{e:#}")))?;
    let context = build_context(cli)?;

    let store = FileLogStore::new(&cli.log_dir)
        .with_context(|| format!("cannot open log directory {}", cli.log_dir.display()))
        .map_err(|e| CliError::Config(format!("{e:#}")))?;

    info!(
        template = %cli.template.display(),
        log_dir = %cli.log_dir.display(),
        "starting validation"
    );

    let validator = LogValidator::new(context, template, store).with_config(config);
    let report = validator.validate().await?;

    let output = ReportOutput::new(&cli.service_name, &cli.log_group, &report);
    OutputFormat::new(cli.format).write(out, &output)
}

/// Loads the configuration file, if any, and applies flag overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn load_config(cli: &Cli) -> anyhow::Result<ValidatorConfig> {
    let mut config = match &cli.config {
        Some(path) => ValidatorConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ValidatorConfig::default(),
    };

    if let Some(max_retries) = cli.max_retries {
        config = config.with_max_retry_count(max_retries);
    }
    if let Some(delay_ms) = cli.retry_delay_ms {
        config = config.with_retry_delay(Duration::from_millis(delay_ms));
    }

    config.validate().context("invalid settings")?;
    Ok(config)
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))
}

/// Builds the validation context from the command line.
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for a `--var` without `=`.
pub fn build_context(cli: &Cli) -> Result<ValidationContext, CliError> {
    let mut context =
        ValidationContext::new(&cli.service_name, &cli.log_group).with_region(&cli.region);
    if let Some(trace_id) = &cli.trace_id {
        context = context.with_trace_id(trace_id);
    }

    for var in &cli.vars {
        let (name, value) = var.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("expected KEY=VALUE for --var, got {var:?}"))
        })?;
        if name.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "empty variable name in --var {var:?}"
            )));
        }
        context = context.with_variable(name, value);
    }
    Ok(context)
}
