//! Core types shared across the validator.
//!
//! This module provides:
//! - [`LogEvent`] — One raw event as returned by a log store
//! - [`ValidationContext`] — Read-only facts about the run under test
//! - [`TimeWindow`] — Trailing query window

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw log event returned by a log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the event was ingested.
    pub timestamp: DateTime<Utc>,
    /// The event text, normally a JSON document.
    pub message: String,
}

impl LogEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(Utc::now(), message)
    }

    /// Parses the message as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.message).ok()
    }
}

/// Read-only facts about the system under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationContext {
    /// Name of the service that emitted the telemetry.
    pub service_name: String,
    /// Cloud region of the log store.
    #[serde(default)]
    pub region: String,
    /// Log group to search.
    pub log_group: String,
    /// Trace id to correlate GenAI logs with, if known.
    #[serde(default)]
    pub trace_id: Option<String>,
    /// Additional template variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl ValidationContext {
    /// Creates a context for a service and log group.
    #[must_use]
    pub fn new(service_name: impl Into<String>, log_group: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_group: log_group.into(),
            ..Self::default()
        }
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Adds a template variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Looks up a template variable by name.
    ///
    /// Built-in names are `serviceName`, `region`, `logGroup` and `traceId`;
    /// anything else comes from [`Self::variables`].
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        match name {
            "serviceName" => Some(&self.service_name),
            "region" => Some(&self.region),
            "logGroup" => Some(&self.log_group),
            "traceId" => self.trace_id.as_deref(),
            other => self.variables.get(other).map(String::as_str),
        }
    }
}

/// A trailing time window ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    lookback: Duration,
}

impl TimeWindow {
    /// Creates a window reaching `lookback` into the past.
    #[must_use]
    pub const fn trailing(lookback: Duration) -> Self {
        Self { lookback }
    }

    /// Returns the lookback.
    #[must_use]
    pub const fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Start of the window, evaluated against the current time.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start_at(Utc::now())
    }

    /// Start of the window relative to `now`.
    #[must_use]
    pub fn start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let lookback =
            chrono::Duration::from_std(self.lookback).unwrap_or_else(|_| chrono::Duration::minutes(5));
        now - lookback
    }
}
