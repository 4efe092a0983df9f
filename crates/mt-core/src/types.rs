//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A record would end before it starts.
    #[error("end {end} is before start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Two mutually exclusive filters were both supplied.
    #[error("use either {first} or {second}, not both")]
    ConflictingFilter {
        first: &'static str,
        second: &'static str,
    },

    /// A log cannot be merged into itself.
    #[error("cannot merge log {log_id} with itself")]
    SelfMerge { log_id: i64 },

    /// Invalid lifecycle state name.
    #[error("invalid log state: {value}")]
    InvalidState { value: String },

    /// Invalid sort order name.
    #[error("invalid sort order: {value} (expected asc or desc)")]
    InvalidOrder { value: String },
}

/// Lifecycle state of a log, derived from its `stopped` flag and its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogState {
    /// Not stopped and owns the open record.
    Running,
    /// Not stopped, every record closed.
    Paused,
    /// Stopped, every record closed.
    Stopped,
}

impl LogState {
    /// String representation used in output and filters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            _ => Err(ValidationError::InvalidState {
                value: s.to_string(),
            }),
        }
    }
}

/// Rejects empty or whitespace-only names.
pub fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Ensures an interval is not inverted.
pub fn validate_interval(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match end {
        Some(end) if end < start => Err(ValidationError::EndBeforeStart { start, end }),
        _ => Ok(()),
    }
}
