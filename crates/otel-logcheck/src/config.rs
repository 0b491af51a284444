//! Validator configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::retry::RetryPolicy;
use crate::types::TimeWindow;

/// Default number of attempts for the outer retry loop.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 40;
/// Default delay between attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 10_000;
/// Default cap for a single backoff delay, in milliseconds.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;
/// Default query lookback, in seconds.
pub const DEFAULT_LOOKBACK_SECS: u64 = 300;
/// Default result limit per query.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Tunables for a validation run.
///
/// Every field has a default, so a JSON file only needs to name the values
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Total attempts of the outer retry loop.
    pub max_retry_count: u32,
    /// Delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Backoff multiplier; 1.0 keeps the delay constant.
    pub backoff_multiplier: f64,
    /// Cap for a single delay, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// How far back each query looks, in seconds.
    pub lookback_secs: u64,
    /// Result limit per query.
    pub max_results: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff_multiplier: 1.0,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            lookback_secs: DEFAULT_LOOKBACK_SECS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl ValidatorConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// values are invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ValidationError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.max_retry_count == 0 {
            return Err(ValidationError::Config(
                "maxRetryCount must be at least 1".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(ValidationError::Config(
                "maxResults must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::Config(format!(
                "backoffMultiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Sets the attempt count.
    #[must_use]
    pub const fn with_max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the query lookback.
    #[must_use]
    pub const fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback_secs = lookback.as_secs();
        self
    }

    /// Sets the result limit per query.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Query lookback.
    #[must_use]
    pub const fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    /// The retry policy these values describe.
    ///
    /// The backoff cap never falls below the base delay, so a long
    /// configured delay is used as given.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let cap = Duration::from_millis(self.max_retry_delay_ms).max(self.retry_delay());
        RetryPolicy::fixed(self.max_retry_count, self.retry_delay())
            .with_backoff(self.backoff_multiplier)
            .with_max_delay(cap)
    }

    /// The query window these values describe.
    #[must_use]
    pub const fn window(&self) -> TimeWindow {
        TimeWindow::trailing(self.lookback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.max_retry_count, 40);
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert_eq!(config.lookback(), Duration::from_secs(300));
        assert_eq!(config.max_results, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_setters() {
        let config = ValidatorConfig::default()
            .with_max_retry_count(3)
            .with_retry_delay(Duration::from_millis(250))
            .with_backoff_multiplier(2.0)
            .with_max_retry_delay(Duration::from_secs(1))
            .with_lookback(Duration::from_secs(60))
            .with_max_results(1);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(1));
        assert_eq!(config.window().lookback(), Duration::from_secs(60));
    }

    #[test]
    fn long_retry_delay_is_not_capped() {
        let config = ValidatorConfig::default().with_retry_delay(Duration::from_secs(120));
        let policy = config.retry_policy();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(120));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ValidatorConfig =
            serde_json::from_str(r#"{"maxRetryCount": 5, "retryDelayMs": 0}"#).expect("parse");
        assert_eq!(config.max_retry_count, 5);
        assert_eq!(config.retry_delay(), Duration::ZERO);
        assert_eq!(config.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ValidatorConfig::default().with_max_retry_count(0).validate().is_err());
        assert!(ValidatorConfig::default().with_max_results(0).validate().is_err());
        assert!(ValidatorConfig::default()
            .with_backoff_multiplier(0.5)
            .validate()
            .is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"maxRetryCount": 2, "lookbackSecs": 30}}"#).expect("write");

        let config = ValidatorConfig::from_json_file(file.path()).expect("load");
        assert_eq!(config.max_retry_count, 2);
        assert_eq!(config.lookback(), Duration::from_secs(30));
    }

    #[test]
    fn file_errors_are_reported() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write");
        assert!(matches!(
            ValidatorConfig::from_json_file(file.path()),
            Err(ValidationError::Config(_))
        ));

        assert!(matches!(
            ValidatorConfig::from_json_file("/nonexistent/config.json"),
            Err(ValidationError::Io(_))
        ));
    }
}
