//! CLI error types.

use std::fmt;

use otel_logcheck::ValidationError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration or unreadable input files.
    Config(String),
    /// Invalid argument.
    InvalidArgument(String),
    /// The logs did not validate.
    Validation(ValidationError),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Validation failures exit with 1; problems with the invocation
    /// itself exit with 2.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 1,
            Self::Config(_) | Self::InvalidArgument(_) | Self::Format(_) | Self::Io(_) => 2,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Validation(e) => write!(f, "validation failed: {e}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}
