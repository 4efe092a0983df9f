//! Tracked entities: tasks, categories, logs and their records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LogState, ValidationError, validate_interval};

/// Opaque key-value document attached to logs and records.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// A named unit of work a log can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named grouping a log can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input for creating a task or a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One contiguous interval of a log.
///
/// A record without `end` is open; at most one record in the whole store may
/// be open at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub log_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Record {
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Elapsed time of the record; open records run until `now`.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }

    /// True if `at` falls strictly inside the record.
    pub fn spans(&self, at: DateTime<Utc>) -> bool {
        self.start < at && self.end.is_none_or(|end| end > at)
    }

    /// Sets the end time, refusing to end before the start.
    pub fn close(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        validate_interval(self.start, Some(at))?;
        self.end = Some(at);
        Ok(())
    }
}

/// A named activity made of one or more records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub stopped: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sorted, unique.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Ordered by start.
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Log {
    pub fn open_record(&self) -> Option<&Record> {
        self.records.iter().find(|record| record.is_open())
    }

    pub fn state(&self) -> LogState {
        if self.stopped {
            LogState::Stopped
        } else if self.open_record().is_some() {
            LogState::Running
        } else {
            LogState::Paused
        }
    }

    /// Start of the earliest record.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|record| record.start).min()
    }

    /// End of the latest record; `None` while a record is open or when empty.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        if self.open_record().is_some() {
            return None;
        }
        self.records.iter().filter_map(|record| record.end).max()
    }

    /// Total tracked time, counting an open record up to `now`.
    pub fn total_duration(&self, now: DateTime<Utc>) -> Duration {
        self.records
            .iter()
            .fold(Duration::zero(), |acc, record| acc + record.duration(now))
    }
}

/// What a caller supplies when starting a new log.
///
/// `category` and `task` are names, resolved against the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLog {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A record supplied inline when creating a log directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub meta: Option<Meta>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// A fully specified log, created as-is without touching other logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogDraft {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub records: Vec<NewRecord>,
}

/// Sorts and deduplicates a flag list.
pub fn normalize_flags(flags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut flags: Vec<String> = flags.into_iter().collect();
    flags.sort();
    flags.dedup();
    flags
}
