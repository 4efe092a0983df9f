//! Log selection filters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Recency order of log listings.
///
/// Descending sorts by the latest record start, ascending by the earliest;
/// ties fall back to the log id in the same direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::InvalidOrder {
                value: s.to_string(),
            }),
        }
    }
}

/// Criteria for listing logs or stopping several at once.
///
/// Category and task may be given by id or by name, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub stopped: Option<bool>,
    /// Matches logs carrying any of these flags.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Logs with a record starting or ending at or after this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Logs with a record starting or ending at or before this instant.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order: SortOrder,
}

impl LogFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.is_some() && self.category_id.is_some() {
            return Err(ValidationError::ConflictingFilter {
                first: "category",
                second: "category_id",
            });
        }
        if self.task.is_some() && self.task_id.is_some() {
            return Err(ValidationError::ConflictingFilter {
                first: "task",
                second: "task_id",
            });
        }
        Ok(())
    }
}
