//! Output formatting for validation reports.
//!
//! Supports text (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use otel_logcheck::ValidationReport;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both text and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TextDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Text => {
                value.write_text(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TextDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

/// Trait for types that can be displayed as text.
pub trait TextDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Summary of a passed validation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    /// Always `passed`; failures are reported on stderr.
    pub status: &'static str,
    /// Service under test.
    pub service_name: String,
    /// Log group searched.
    pub log_group: String,
    /// Number of expected entries matched.
    pub entries: usize,
    /// Attempts used.
    pub attempts: u32,
    /// Elapsed wall time in milliseconds.
    pub elapsed_ms: u64,
}

impl ReportOutput {
    /// Builds the output from a validation report.
    #[must_use]
    pub fn new(service_name: &str, log_group: &str, report: &ValidationReport) -> Self {
        Self {
            status: "passed",
            service_name: service_name.to_string(),
            log_group: log_group.to_string(),
            entries: report.entries,
            attempts: report.attempts,
            elapsed_ms: report.elapsed.as_millis() as u64,
        }
    }
}

impl TextDisplay for ReportOutput {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Log validation passed")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Service:    {}", self.service_name)?;
        writeln!(writer, "Log group:  {}", self.log_group)?;
        writeln!(writer, "Entries:    {}", self.entries)?;
        writeln!(writer, "Attempts:   {}", self.attempts)?;
        writeln!(writer, "Elapsed:    {} ms", self.elapsed_ms)?;
        Ok(())
    }
}
