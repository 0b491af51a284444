//! File-backed log store.
//!
//! This module provides:
//! - [`FileLogStore`] — Log groups persisted as JSON-lines files
//! - Implementation of [`LogQueryService`] over a local directory
//!
//! Each log group maps to one file in the base directory. The group name
//! has its `/` separators replaced by `_` and any leading separator
//! dropped, so `/aws/app/x` is stored in `aws_app_x.jsonl`. Every line is
//! one serialized [`LogEvent`]. Files are re-read on every query, so
//! events appended by another process become visible to a polling
//! validator.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::FilterExpression;
use crate::store::select_events;
use crate::traits::LogQueryService;
use crate::types::LogEvent;

const FILE_EXTENSION: &str = "jsonl";

/// JSON-lines log groups in a directory.
pub struct FileLogStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLogStore {
    /// Opens a store rooted at `base_dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the file backing a log group.
    #[must_use]
    pub fn path_for_group(&self, log_group: &str) -> PathBuf {
        let name: String = log_group
            .trim_start_matches('/')
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.base_dir.join(format!("{name}.{FILE_EXTENSION}"))
    }

    /// Appends an event to a log group.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be written.
    pub fn append(&self, log_group: &str, event: &LogEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(std::io::Error::from)?;
        let line = format!("{line}\n");

        let _guard = self.write_lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for_group(log_group))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Appends a message stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be written.
    pub fn append_message(&self, log_group: &str, message: impl Into<String>) -> Result<()> {
        self.append(log_group, &LogEvent::now(message))
    }

    /// Reads every event of a log group, in file order.
    ///
    /// A group without a file is empty. Lines that are not serialized
    /// events are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_group(&self, log_group: &str) -> Result<Vec<LogEvent>> {
        let path = self.path_for_group(log_group);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    path = %path.display(),
                    line = number + 1,
                    error = %e,
                    "skipping unreadable log line"
                ),
            }
        }
        Ok(events)
    }

    /// Answers a filter query synchronously.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter cannot be parsed or the group file
    /// cannot be read.
    pub fn query(
        &self,
        log_group: &str,
        filter_expression: &str,
        start_time: DateTime<Utc>,
        max_results: usize,
    ) -> Result<Vec<LogEvent>> {
        let filter = FilterExpression::parse(filter_expression)?;
        let events = self.read_group(log_group)?;
        let selected = select_events(&events, &filter, start_time, max_results);

        debug!(
            log_group,
            scanned = events.len(),
            matched = selected.len(),
            "file store query"
        );
        Ok(selected)
    }
}

impl LogQueryService for FileLogStore {
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
