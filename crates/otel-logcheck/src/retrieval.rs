//! Log retrieval.
//!
//! The [`Retriever`] runs candidate filter expressions against a
//! [`LogQueryService`] and returns the first record found, flattened for
//! matching.

use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::filter::FilterExpression;
use crate::flatten::{flatten_str, FlatRecord, FlattenMode};
use crate::traits::LogQueryService;
use crate::types::TimeWindow;

/// A record found by [`Retriever::fetch_first`].
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    /// The filter expression that returned the record.
    pub filter: String,
    /// The record, flattened for matching.
    pub record: FlatRecord,
}

/// Runs filter queries for one log group.
#[derive(Debug)]
pub struct Retriever<'a, Q> {
    service: &'a Q,
    log_group: &'a str,
    window: TimeWindow,
    max_results: usize,
}

impl<'a, Q: LogQueryService> Retriever<'a, Q> {
    /// Creates a retriever.
    #[must_use]
    pub const fn new(
        service: &'a Q,
        log_group: &'a str,
        window: TimeWindow,
        max_results: usize,
    ) -> Self {
        Self {
            service,
            log_group,
            window,
            max_results,
        }
    }

    /// Tries `candidates` in order and returns the first record found,
    /// together with the filter that found it.
    ///
    /// Later candidates are not queried once one returns a record. The
    /// window start is recomputed for every query.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyResultSet`] naming the last filter if no
    ///   candidate matched anything
    /// - [`ValidationError::MalformedLog`] if the record is not JSON
    /// - any error from the query service, unchanged
    pub async fn fetch_first(
        &self,
        candidates: &[FilterExpression],
        mode: FlattenMode,
    ) -> Result<Retrieved> {
        let mut last_filter = String::new();

        for candidate in candidates {
            let filter = candidate.to_string();
            let start_time = self.window.start();
            debug!(log_group = self.log_group, %filter, %start_time, "querying logs");

            let events = self
                .service
                .filter_logs(self.log_group, &filter, start_time, self.max_results)
                .await?;

            if let Some(event) = events.into_iter().next() {
                debug!(message = %event.message, "retrieved log record");
                let record =
                    flatten_str(&event.message, mode).map_err(ValidationError::MalformedLog)?;
                return Ok(Retrieved { filter, record });
            }
            last_filter = filter;
        }

        Err(ValidationError::EmptyResultSet {
            filter: last_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Clause;
    use crate::path::FieldPath;
    use crate::store::MemoryLogStore;
    use crate::types::LogEvent;
    use serde_json::json;
    use std::time::Duration;

    const GROUP: &str = "group";

    fn service_is(name: &str) -> FilterExpression {
        FilterExpression::new().and(Clause::equals(FieldPath::root().key("Service"), name))
    }

    fn retriever(store: &MemoryLogStore) -> Retriever<'_, MemoryLogStore> {
        Retriever::new(store, GROUP, TimeWindow::trailing(Duration::from_secs(300)), 10)
    }

    #[tokio::test]
    async fn first_non_empty_candidate_wins() {
        let store = MemoryLogStore::new();
        store.append_json(GROUP, &json!({"Service": "b", "n": 1}));
        store.append_json(GROUP, &json!({"Service": "c", "n": 2}));

        let found = retriever(&store)
            .fetch_first(&[service_is("a"), service_is("b"), service_is("c")], FlattenMode::Exploded)
            .await
            .expect("record");

        assert_eq!(found.record.get("n"), Some(&json!(1)));
        assert_eq!(found.filter, service_is("b").to_string());
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn first_returned_event_is_used() {
        let store = MemoryLogStore::new();
        store.append_json(GROUP, &json!({"Service": "a", "n": 1}));
        store.append_json(GROUP, &json!({"Service": "a", "n": 2}));

        let found = retriever(&store)
            .fetch_first(&[service_is("a")], FlattenMode::Exploded)
            .await
            .expect("record");
        assert_eq!(found.record.get("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn empty_result_names_last_filter() {
        let store = MemoryLogStore::new();
        let result = retriever(&store)
            .fetch_first(&[service_is("a"), service_is("z")], FlattenMode::Exploded)
            .await;

        let last = service_is("z").to_string();
        assert!(matches!(
            result,
            Err(ValidationError::EmptyResultSet { ref filter }) if *filter == last
        ));
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn flattens_with_requested_mode() {
        let store = MemoryLogStore::new();
        store.append_json(GROUP, &json!({"Service": "a", "tags": ["x", "y"]}));

        let exploded = retriever(&store)
            .fetch_first(&[service_is("a")], FlattenMode::Exploded)
            .await
            .expect("record");
        assert_eq!(exploded.record.get("tags[1]"), Some(&json!("y")));

        let kept = retriever(&store)
            .fetch_first(&[service_is("a")], FlattenMode::KeepArrays)
            .await
            .expect("record");
        assert_eq!(kept.record.get("tags"), Some(&json!(["x", "y"])));
    }

    enum StubService {
        Failing,
        Canned(&'static str),
    }

    impl LogQueryService for StubService {
        async fn filter_logs(
            &self,
            _log_group: &str,
            _filter_expression: &str,
            _start_time: chrono::DateTime<chrono::Utc>,
            _max_results: usize,
        ) -> Result<Vec<LogEvent>> {
            match self {
                Self::Failing => Err(ValidationError::Query("throttled".to_string())),
                Self::Canned(message) => Ok(vec![LogEvent::now(*message)]),
            }
        }
    }

    fn stub_retriever(service: &StubService) -> Retriever<'_, StubService> {
        Retriever::new(service, GROUP, TimeWindow::trailing(Duration::from_secs(300)), 10)
    }

    #[tokio::test]
    async fn query_errors_propagate() {
        let result = stub_retriever(&StubService::Failing)
            .fetch_first(&[service_is("a"), service_is("b")], FlattenMode::Exploded)
            .await;
        assert!(matches!(result, Err(ValidationError::Query(ref m)) if m == "throttled"));
    }

    #[tokio::test]
    async fn non_json_record_is_malformed() {
        let result = stub_retriever(&StubService::Canned("GET /items 200 OK"))
            .fetch_first(&[service_is("a")], FlattenMode::Exploded)
            .await;
        assert!(matches!(result, Err(ValidationError::MalformedLog(_))));
    }
}
