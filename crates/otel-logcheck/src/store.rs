//! In-memory log store.
//!
//! This module provides:
//! - [`MemoryLogStore`] — Thread-safe log groups held in memory
//! - Implementation of [`LogQueryService`] for local runs and tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::filter::FilterExpression;
use crate::traits::LogQueryService;
use crate::types::LogEvent;

/// Thread-safe in-memory log groups.
///
/// Events are kept in insertion order per group. Every query is counted,
/// which lets callers assert on how often the store was polled.
#[derive(Default)]
pub struct MemoryLogStore {
    groups: RwLock<HashMap<String, Vec<LogEvent>>>,
    queries: AtomicU64,
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store behind an [`Arc`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Appends an event to a log group.
    pub fn append(&self, log_group: impl Into<String>, event: LogEvent) {
        self.groups
            .write()
            .entry(log_group.into())
            .or_default()
            .push(event);
    }

    /// Appends a message stamped with the current time.
    pub fn append_message(&self, log_group: impl Into<String>, message: impl Into<String>) {
        self.append(log_group, LogEvent::now(message));
    }

    /// Appends a JSON document stamped with the current time.
    pub fn append_json(&self, log_group: impl Into<String>, document: &serde_json::Value) {
        self.append_message(log_group, document.to_string());
    }

    /// Returns the number of events in a group.
    #[must_use]
    pub fn len(&self, log_group: &str) -> usize {
        self.groups.read().get(log_group).map_or(0, Vec::len)
    }

    /// Returns true if no group holds any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.read().values().all(Vec::is_empty)
    }

    /// Removes every event.
    pub fn clear(&self) {
        self.groups.write().clear();
    }

    /// Returns how many queries have been answered.
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Answers a filter query synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValidationError::InvalidFilter`] if the expression
    /// cannot be parsed.
    pub fn query(
        &self,
        log_group: &str,
        filter_expression: &str,
        start_time: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<LogEvent>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let filter = FilterExpression::parse(filter_expression)?;

        let groups = self.groups.read();
        let events = groups.get(log_group).map_or(&[][..], Vec::as_slice);
        let selected = select_events(events, &filter, start_time, max_results);
        drop(groups);

        debug!(
            log_group,
            matched = selected.len(),
            "memory store query"
        );
        Ok(selected)
    }
}

impl LogQueryService for MemoryLogStore {
    async fn filter_logs(
        &self,
        log_group: &str,
        filter_expression: &str,
        start_time: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<LogEvent>> {
        self.query(log_group, filter_expression, start_time, max_results)
    }
}

/// Selects events matching a filter, in order.
///
/// Events whose message is not JSON never match. Events before
/// `start_time` are skipped.
pub(crate) fn select_events<'a, I>(
    events: I,
    filter: &FilterExpression,
    start_time: DateTime<Utc>,
    max_results: usize,
) -> Vec<LogEvent>
where
    I: IntoIterator<Item = &'a LogEvent>,
{
    events
        .into_iter()
        .filter(|event| event.timestamp >= start_time)
        .filter(|event| event.json().is_some_and(|doc| filter.matches(&doc)))
        .take(max_results)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;

    const GROUP: &str = "/aws/application-signals/data";

    fn recent() -> DateTime<Utc> {
        Utc::now() - chrono::Duration::minutes(5)
    }

    fn service_filter(name: &str) -> String {
        format!("{{ ($.Service = \"{name}\") }}")
    }

    // ========================================================================
    // Append / bookkeeping
    // ========================================================================

    #[test]
    fn new_store_is_empty() {
        let store = MemoryLogStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(GROUP), 0);
        assert_eq!(store.query_count(), 0);
    }

    #[test]
    fn append_is_per_group() {
        let store = MemoryLogStore::new();
        store.append_message(GROUP, "{}");
        store.append_message("other", "{}");
        store.append_message("other", "{}");

        assert_eq!(store.len(GROUP), 1);
        assert_eq!(store.len("other"), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let store = MemoryLogStore::new();
        store.append_message(GROUP, "{}");
        store.clear();
        assert!(store.is_empty());
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[test]
    fn query_matches_filter_in_insertion_order() {
        let store = MemoryLogStore::new();
        store.append_json(GROUP, &json!({"Service": "orders", "n": 1}));
        store.append_json(GROUP, &json!({"Service": "billing", "n": 2}));
        store.append_json(GROUP, &json!({"Service": "orders", "n": 3}));

        let events = store.query(GROUP, &service_filter("orders"), recent(), 10);
        let ns: Vec<i64> = events
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.json().and_then(|v| v["n"].as_i64()))
            .collect();
        assert_eq!(ns, vec![1, 3]);
    }

    #[test]
    fn query_respects_limit() {
        let store = MemoryLogStore::new();
        for _ in 0..5 {
            store.append_json(GROUP, &json!({"Service": "orders"}));
        }
        let events = store.query(GROUP, &service_filter("orders"), recent(), 2);
        assert_eq!(events.map(|e| e.len()).ok(), Some(2));
    }

    #[test]
    fn query_skips_events_before_start() {
        let store = MemoryLogStore::new();
        store.append(
            GROUP,
            LogEvent::new(
                Utc::now() - chrono::Duration::hours(1),
                json!({"Service": "orders"}).to_string(),
            ),
        );
        let events = store.query(GROUP, &service_filter("orders"), recent(), 10);
        assert_eq!(events.map(|e| e.len()).ok(), Some(0));
    }

    #[test]
    fn query_skips_non_json_messages() {
        let store = MemoryLogStore::new();
        store.append_message(GROUP, "Service = orders");
        let events = store.query(GROUP, "{ }", recent(), 10);
        assert_eq!(events.map(|e| e.len()).ok(), Some(0));
    }

    #[test]
    fn query_unknown_group_is_empty() {
        let store = MemoryLogStore::new();
        let events = store.query("missing", "{ }", recent(), 10);
        assert_eq!(events.map(|e| e.len()).ok(), Some(0));
    }

    #[test]
    fn query_rejects_bad_filter_but_counts_it() {
        let store = MemoryLogStore::new();
        let result = store.query(GROUP, "Service = orders", recent(), 10);
        assert!(matches!(result, Err(ValidationError::InvalidFilter(_))));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn serves_as_query_service() {
        let store = MemoryLogStore::shared();
        store.append_json(GROUP, &json!({"Service": "orders"}));

        let events = store
            .filter_logs(GROUP, &service_filter("orders"), recent(), 10)
            .await;
        assert_eq!(events.map(|e| e.len()).ok(), Some(1));
        assert_eq!(store.query_count(), 1);
    }
}
