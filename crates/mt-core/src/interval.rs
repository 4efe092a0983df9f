//! Split and merge planning.
//!
//! These functions decide *what* changes when a log is cut at an instant or
//! two logs are folded together. Applying the plan to storage is the store's
//! job.

use chrono::{DateTime, Utc};

use crate::model::{Log, Meta, Record, normalize_flags};

/// Key under which the second log's meta is kept when both logs carry meta.
pub const MERGED_META_KEY: &str = "_merged";

/// Separator between differing log names in a merge.
pub const NAME_SEPARATOR: &str = " + ";

/// Separator between differing descriptions in a merge.
pub const DESCRIPTION_SEPARATOR: &str = "\n\n";

/// The tail half of a record that straddles the split point.
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedRecord {
    /// Record being truncated on the original log.
    pub source_id: i64,
    pub meta: Option<Meta>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Changes needed to cut a log in two at `at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPlan {
    /// Records whose end becomes the split point.
    pub truncate: Vec<i64>,
    /// New records for the sibling log, one per truncated record.
    pub carry: Vec<CarriedRecord>,
    /// Records starting at or after the split point, moved to the sibling.
    pub moved: Vec<i64>,
}

impl SplitPlan {
    pub fn is_noop(&self) -> bool {
        self.truncate.is_empty() && self.moved.is_empty()
    }
}

/// Plans a split of `records` at `at`.
///
/// Records entirely before `at` are left alone.
pub fn plan_split(records: &[Record], at: DateTime<Utc>) -> SplitPlan {
    let mut plan = SplitPlan::default();
    for record in records {
        if record.spans(at) {
            plan.truncate.push(record.id);
            plan.carry.push(CarriedRecord {
                source_id: record.id,
                meta: record.meta.clone(),
                start: at,
                end: record.end,
            });
        } else if record.start >= at {
            plan.moved.push(record.id);
        }
    }
    plan
}

/// Field values of a log after absorbing another one.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFields {
    pub name: String,
    pub description: Option<String>,
    pub stopped: bool,
    pub category_id: Option<i64>,
    pub task_id: Option<i64>,
    pub meta: Option<Meta>,
    pub flags: Vec<String>,
}

/// Combines the fields of `target` with those of `other`.
///
/// The target wins wherever it has a value; `stopped` only survives if both
/// logs were stopped.
pub fn merge_fields(target: &Log, other: &Log) -> MergedFields {
    let name = if target.name == other.name {
        target.name.clone()
    } else {
        format!("{}{NAME_SEPARATOR}{}", target.name, other.name)
    };

    let description = match (&target.description, &other.description) {
        (Some(a), Some(b)) if a != b => Some(format!("{a}{DESCRIPTION_SEPARATOR}{b}")),
        (Some(a), _) => Some(a.clone()),
        (None, b) => b.clone(),
    };

    let meta = match (&target.meta, &other.meta) {
        (Some(a), Some(b)) if a != b => {
            let mut merged = a.clone();
            merged.insert(
                MERGED_META_KEY.to_string(),
                serde_json::Value::Object(b.clone()),
            );
            Some(merged)
        }
        (Some(a), _) => Some(a.clone()),
        (None, b) => b.clone(),
    };

    MergedFields {
        name,
        description,
        stopped: target.stopped && other.stopped,
        category_id: target.category_id.or(other.category_id),
        task_id: target.task_id.or(other.task_id),
        meta,
        flags: normalize_flags(target.flags.iter().chain(&other.flags).cloned()),
    }
}
