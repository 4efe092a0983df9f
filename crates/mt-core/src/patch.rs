//! Partial updates.
//!
//! A patch field is either [`Field::Unset`] (leave the stored value alone) or
//! [`Field::Set`]. Nullable columns use `Field<Option<T>>`, so an explicit
//! JSON `null` clears the value while a missing key leaves it untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::Meta;

/// A patch slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Unset,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Field<T> {
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Unset => None,
            Self::Set(value) => Some(value),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::Set)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::Set(value) => value.serialize(serializer),
        }
    }
}

/// Partial update of a record nested inside a log update.
///
/// Without `id` the entry describes a new record on the patched log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub meta: Field<Option<Meta>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub start: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub end: Field<Option<DateTime<Utc>>>,
}

/// Partial update of a standalone record; may move it to another log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub log_id: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub meta: Field<Option<Meta>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub start: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub end: Field<Option<DateTime<Utc>>>,
}

/// Partial update of a task or a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPatch {
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub description: Field<Option<String>>,
}

/// Partial update of a log.
///
/// `category` and `task` are names; `flags: null` clears every flag while a
/// list replaces the set; `records` upserts nested records by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPatch {
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub category: Field<Option<String>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub task: Field<Option<String>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub flags: Field<Option<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub meta: Field<Option<Meta>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub stopped: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub description: Field<Option<String>>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub records: Field<Option<Vec<RecordPatch>>>,
}

/// One present field of a [`LogPatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogChange {
    Category(Option<String>),
    Task(Option<String>),
    Flags(Option<Vec<String>>),
    Meta(Option<Meta>),
    Stopped(bool),
    Name(String),
    Description(Option<String>),
    Records(Vec<RecordPatch>),
}

impl LogPatch {
    pub fn is_empty(&self) -> bool {
        self.changes_len() == 0
    }

    fn changes_len(&self) -> usize {
        [
            self.category.is_unset(),
            self.task.is_unset(),
            self.flags.is_unset(),
            self.meta.is_unset(),
            self.stopped.is_unset(),
            self.name.is_unset(),
            self.description.is_unset(),
            self.records.is_unset(),
        ]
        .into_iter()
        .filter(|unset| !unset)
        .count()
    }

    /// Present fields in application order.
    ///
    /// `records: null` carries nothing to apply and is dropped.
    pub fn into_changes(self) -> Vec<LogChange> {
        let mut changes = Vec::with_capacity(self.changes_len());
        if let Field::Set(category) = self.category {
            changes.push(LogChange::Category(category));
        }
        if let Field::Set(task) = self.task {
            changes.push(LogChange::Task(task));
        }
        if let Field::Set(flags) = self.flags {
            changes.push(LogChange::Flags(flags));
        }
        if let Field::Set(meta) = self.meta {
            changes.push(LogChange::Meta(meta));
        }
        if let Field::Set(stopped) = self.stopped {
            changes.push(LogChange::Stopped(stopped));
        }
        if let Field::Set(name) = self.name {
            changes.push(LogChange::Name(name));
        }
        if let Field::Set(description) = self.description {
            changes.push(LogChange::Description(description));
        }
        if let Field::Set(Some(records)) = self.records {
            changes.push(LogChange::Records(records));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_unset_and_null_is_set_none() {
        let patch: LogPatch =
            serde_json::from_str(r#"{"description": null, "name": "deep work"}"#).unwrap();

        assert!(patch.category.is_unset());
        assert_eq!(patch.description, Field::Set(None));
        assert_eq!(patch.name, Field::Set("deep work".to_string()));
    }

    #[test]
    fn null_flags_clear_while_list_replaces() {
        let clear: LogPatch = serde_json::from_str(r#"{"flags": null}"#).unwrap();
        assert_eq!(clear.into_changes(), vec![LogChange::Flags(None)]);

        let replace: LogPatch = serde_json::from_str(r#"{"flags": ["billable"]}"#).unwrap();
        assert_eq!(
            replace.into_changes(),
            vec![LogChange::Flags(Some(vec!["billable".to_string()]))]
        );
    }

    #[test]
    fn null_records_produce_no_change() {
        let patch: LogPatch = serde_json::from_str(r#"{"records": null}"#).unwrap();
        assert!(!patch.is_empty());
        assert!(patch.into_changes().is_empty());
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let patch = LogPatch::default();
        assert!(patch.is_empty());
        assert_eq!(serde_json::to_string(&patch).unwrap(), "{}");
    }

    #[test]
    fn nested_record_patch_keeps_absent_fields_unset() {
        let patch: LogPatch = serde_json::from_str(
            r#"{"records": [{"id": 4, "end": null}, {"start": "2025-01-01T09:00:00Z"}]}"#,
        )
        .unwrap();
        let changes = patch.into_changes();
        let LogChange::Records(records) = &changes[0] else {
            panic!("expected records change, got {changes:?}");
        };
        assert_eq!(records[0].id, Some(4));
        assert_eq!(records[0].end, Field::Set(None));
        assert!(records[0].start.is_unset());
        assert_eq!(records[1].id, None);
        assert!(!records[1].start.is_unset());
    }
}
