//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Check that expected telemetry logs reached a log store.
#[derive(Parser, Debug, Clone)]
#[command(name = "otel-logcheck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Expectation template (JSON with `{{name}}` placeholders).
    #[arg(short, long, env = "OTEL_LOGCHECK_TEMPLATE")]
    pub template: PathBuf,

    /// Directory holding one JSON-lines file per log group.
    #[arg(short = 'd', long, env = "OTEL_LOGCHECK_LOG_DIR")]
    pub log_dir: PathBuf,

    /// Name of the service that emitted the logs.
    #[arg(short, long, env = "OTEL_LOGCHECK_SERVICE_NAME")]
    pub service_name: String,

    /// Log group to search.
    #[arg(short = 'g', long, env = "OTEL_LOGCHECK_LOG_GROUP")]
    pub log_group: String,

    /// Region of the log store.
    #[arg(long, env = "OTEL_LOGCHECK_REGION", default_value = "")]
    pub region: String,

    /// Trace id used to correlate GenAI message logs.
    #[arg(long, env = "OTEL_LOGCHECK_TRACE_ID")]
    pub trace_id: Option<String>,

    /// Extra template variable (KEY=VALUE, repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// JSON configuration file.
    #[arg(short, long, env = "OTEL_LOGCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Total validation attempts (overrides the config file).
    #[arg(long, env = "OTEL_LOGCHECK_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Delay between attempts in milliseconds (overrides the config file).
    #[arg(long, env = "OTEL_LOGCHECK_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// Report format.
    #[arg(short, long, env = "OTEL_LOGCHECK_FORMAT", value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Emit diagnostics as JSON lines.
    #[arg(long, env = "OTEL_LOGCHECK_JSON_LOGS")]
    pub json_logs: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable summary.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
