//! Public entry point: one transaction per operation, behind a read-only gate.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mt_core::types::validate_name;
use mt_core::{
    Category, DynamicId, Field, LabelDraft, LabelPatch, Log, LogDraft, LogFilter, LogPatch,
    NewLog, NewRecord, Record, RecordUpdate, Task,
};
use rusqlite::Connection;

use crate::lifecycle::{self, CreateMissing, ResumeOutcome, StopOutcome};
use crate::store::{self, LabelKind, LabelRow};
use crate::{DEFAULT_BUSY_TIMEOUT, Database, TrackError, editor, locator};

/// Construction-time settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    /// Reject every mutation with [`TrackError::ReadOnly`].
    pub read_only: bool,
    pub busy_timeout: Duration,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Which log an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// The log owning the open record.
    Active,
    Dynamic(DynamicId),
}

impl From<DynamicId> for LogTarget {
    fn from(id: DynamicId) -> Self {
        Self::Dynamic(id)
    }
}

/// Tracks time in logs and records stored in one database.
///
/// Mutating methods take the request time explicitly and run in a single
/// `IMMEDIATE` transaction; a failed call leaves the store untouched.
/// Times are stored with millisecond precision, so callers pass request
/// times resolved through [`mt_core::RequestTime::resolve`] to get back
/// exactly the instant they asked for.
pub struct Tracker {
    db: Database,
    options: TrackerOptions,
}

impl Tracker {
    pub fn new(db: Database, options: TrackerOptions) -> Result<Self, TrackError> {
        db.set_busy_timeout(options.busy_timeout)?;
        Ok(Self { db, options })
    }

    pub fn open(path: &Path, options: TrackerOptions) -> Result<Self, TrackError> {
        Self::new(Database::open(path)?, options)
    }

    pub fn open_in_memory(options: TrackerOptions) -> Result<Self, TrackError> {
        Self::new(Database::open_in_memory()?, options)
    }

    pub const fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    fn read(&self) -> &Connection {
        self.db.connection()
    }

    fn write<T>(
        &mut self,
        op: impl FnOnce(&Connection) -> Result<T, TrackError>,
    ) -> Result<T, TrackError> {
        if self.options.read_only {
            return Err(TrackError::ReadOnly);
        }
        let tx = self.db.write_transaction()?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ========== Lifecycle ==========

    /// Starts a new running log; whatever was running is paused.
    pub fn start_log(
        &mut self,
        new: &NewLog,
        create: CreateMissing,
        at: DateTime<Utc>,
    ) -> Result<Log, TrackError> {
        self.write(|conn| lifecycle::start_log(conn, new, create, at))
    }

    /// Starts a new running log; whatever was running is stopped.
    pub fn next_log(
        &mut self,
        new: &NewLog,
        create: CreateMissing,
        at: DateTime<Utc>,
    ) -> Result<Log, TrackError> {
        self.write(|conn| lifecycle::next_log(conn, new, create, at))
    }

    pub fn pause_log(&mut self, log_id: i64, at: DateTime<Utc>) -> Result<Log, TrackError> {
        self.write(|conn| lifecycle::pause_log(conn, log_id, at))
    }

    pub fn pause_active_log(&mut self, at: DateTime<Utc>) -> Result<Log, TrackError> {
        self.write(|conn| lifecycle::pause_active_log(conn, at))
    }

    /// Stops a log. Stopping the running log resumes the most recently
    /// active log that is not stopped.
    pub fn stop_log(&mut self, id: DynamicId, at: DateTime<Utc>) -> Result<StopOutcome, TrackError> {
        self.write(|conn| lifecycle::stop_log(conn, id, at))
    }

    pub fn stop_active_log(&mut self, at: DateTime<Utc>) -> Result<StopOutcome, TrackError> {
        self.write(|conn| lifecycle::stop_active_log(conn, at))
    }

    /// Stops every matching log that is not stopped yet, without resuming
    /// anything.
    pub fn stop_all_logs(
        &mut self,
        filter: &LogFilter,
        at: DateTime<Utc>,
    ) -> Result<Vec<Log>, TrackError> {
        self.write(|conn| lifecycle::stop_all_logs(conn, filter, at))
    }

    /// Resumes a log, pausing whatever was running.
    ///
    /// A stopped log found holding an open record is repaired and the repair
    /// is committed, but the call still fails with
    /// [`TrackError::StateMismatch`].
    pub fn resume_log(&mut self, id: DynamicId, at: DateTime<Utc>) -> Result<Log, TrackError> {
        match self.write(|conn| lifecycle::resume_log(conn, id, at))? {
            ResumeOutcome::Resumed(log) => Ok(log),
            ResumeOutcome::Repaired(log_id) => Err(TrackError::StateMismatch { log_id }),
        }
    }

    // ========== Logs ==========

    pub fn get_active_log(&self) -> Result<Log, TrackError> {
        let conn = self.read();
        let active = locator::find_active_record(conn)?.ok_or(TrackError::NoActiveLog)?;
        store::require_log(conn, active.log_id)
    }

    pub fn get_log(&self, id: DynamicId) -> Result<Log, TrackError> {
        let conn = self.read();
        store::require_log(conn, locator::resolve_dynamic_id(conn, id)?)
    }

    pub fn list_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, TrackError> {
        let conn = self.read();
        let Some(query) = locator::filtered_query(conn, filter)? else {
            return Ok(Vec::new());
        };
        store::load_logs(conn, &query.ids(conn)?)
    }

    /// Logs that can be resumed: not stopped and holding no open record,
    /// most recently active first.
    pub fn list_paused_logs(&self) -> Result<Vec<Log>, TrackError> {
        let conn = self.read();
        store::load_logs(conn, &locator::paused_log_ids(conn)?)
    }

    /// Inserts a fully described log with its records and flags.
    pub fn create_log(&mut self, draft: &LogDraft) -> Result<Log, TrackError> {
        self.write(|conn| editor::create_log(conn, draft))
    }

    /// Applies a partial update. New nested records without a start begin
    /// at `at`.
    pub fn update_log(
        &mut self,
        target: LogTarget,
        patch: LogPatch,
        create: CreateMissing,
        at: DateTime<Utc>,
    ) -> Result<Log, TrackError> {
        self.write(|conn| {
            let log_id = match target {
                LogTarget::Active => {
                    locator::find_active_record(conn)?
                        .ok_or(TrackError::NoActiveLog)?
                        .log_id
                }
                LogTarget::Dynamic(id) => locator::resolve_dynamic_id(conn, id)?,
            };
            editor::update_log(conn, log_id, patch, create, at)
        })
    }

    pub fn delete_log(&mut self, id: DynamicId) -> Result<Log, TrackError> {
        self.write(|conn| editor::delete_log(conn, id))
    }

    /// Cuts a log at `at`, returning the original and the new sibling.
    pub fn split_log(&mut self, id: DynamicId, at: DateTime<Utc>) -> Result<(Log, Log), TrackError> {
        self.write(|conn| editor::split_log(conn, id, at))
    }

    /// Moves every record of `other_id` into `log_id` and deletes `other_id`.
    pub fn merge_logs(&mut self, log_id: i64, other_id: i64) -> Result<Log, TrackError> {
        self.write(|conn| editor::merge_logs(conn, log_id, other_id))
    }

    // ========== Records ==========

    pub fn create_record(&mut self, log_id: i64, new: &NewRecord) -> Result<Record, TrackError> {
        self.write(|conn| editor::create_record(conn, log_id, new))
    }

    pub fn get_record(&self, record_id: i64) -> Result<Record, TrackError> {
        store::get_record(self.read(), record_id)?
            .ok_or_else(|| TrackError::not_found("record", record_id))
    }

    /// The log owning a record.
    pub fn record_log(&self, record_id: i64) -> Result<Log, TrackError> {
        let record = self.get_record(record_id)?;
        store::require_log(self.read(), record.log_id)
    }

    pub fn update_record(
        &mut self,
        record_id: i64,
        update: RecordUpdate,
    ) -> Result<Record, TrackError> {
        self.write(|conn| editor::update_record(conn, record_id, update))
    }

    /// Deletes a record, and its log if that was the last record.
    pub fn delete_record(&mut self, record_id: i64) -> Result<Record, TrackError> {
        self.write(|conn| editor::delete_record(conn, record_id))
    }

    // ========== Tasks & categories ==========

    pub fn create_task(&mut self, draft: &LabelDraft) -> Result<Task, TrackError> {
        self.create_label(LabelKind::Task, draft).map(Task::from)
    }

    pub fn get_task(&self, id: i64) -> Result<Task, TrackError> {
        self.get_label(LabelKind::Task, id).map(Task::from)
    }

    pub fn get_task_by_name(&self, name: &str) -> Result<Task, TrackError> {
        self.get_label_by_name(LabelKind::Task, name).map(Task::from)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, TrackError> {
        Ok(store::list_labels(self.read(), LabelKind::Task)?
            .into_iter()
            .map(Task::from)
            .collect())
    }

    pub fn update_task(&mut self, id: i64, patch: LabelPatch) -> Result<Task, TrackError> {
        self.update_label(LabelKind::Task, id, patch).map(Task::from)
    }

    /// Deletes a task; logs filed under it keep existing without a task.
    pub fn delete_task(&mut self, id: i64) -> Result<Task, TrackError> {
        self.delete_label(LabelKind::Task, id).map(Task::from)
    }

    pub fn create_category(&mut self, draft: &LabelDraft) -> Result<Category, TrackError> {
        self.create_label(LabelKind::Category, draft)
            .map(Category::from)
    }

    pub fn get_category(&self, id: i64) -> Result<Category, TrackError> {
        self.get_label(LabelKind::Category, id).map(Category::from)
    }

    pub fn get_category_by_name(&self, name: &str) -> Result<Category, TrackError> {
        self.get_label_by_name(LabelKind::Category, name)
            .map(Category::from)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, TrackError> {
        Ok(store::list_labels(self.read(), LabelKind::Category)?
            .into_iter()
            .map(Category::from)
            .collect())
    }

    pub fn update_category(&mut self, id: i64, patch: LabelPatch) -> Result<Category, TrackError> {
        self.update_label(LabelKind::Category, id, patch)
            .map(Category::from)
    }

    /// Deletes a category; logs filed under it keep existing without one.
    pub fn delete_category(&mut self, id: i64) -> Result<Category, TrackError> {
        self.delete_label(LabelKind::Category, id)
            .map(Category::from)
    }

    fn create_label(&mut self, kind: LabelKind, draft: &LabelDraft) -> Result<LabelRow, TrackError> {
        self.write(|conn| {
            validate_name("name", &draft.name)?;
            let label = store::insert_label(conn, kind, &draft.name, draft.description.as_deref())?;
            tracing::debug!(entity = kind.entity(), id = label.id, "created label");
            Ok(label)
        })
    }

    fn get_label(&self, kind: LabelKind, id: i64) -> Result<LabelRow, TrackError> {
        store::get_label(self.read(), kind, id)?.ok_or_else(|| TrackError::not_found(kind.entity(), id))
    }

    fn get_label_by_name(&self, kind: LabelKind, name: &str) -> Result<LabelRow, TrackError> {
        store::find_label_by_name(self.read(), kind, name)?
            .ok_or_else(|| TrackError::not_found(kind.entity(), name))
    }

    fn update_label(
        &mut self,
        kind: LabelKind,
        id: i64,
        patch: LabelPatch,
    ) -> Result<LabelRow, TrackError> {
        self.write(|conn| {
            let mut label = store::get_label(conn, kind, id)?
                .ok_or_else(|| TrackError::not_found(kind.entity(), id))?;
            if let Field::Set(name) = patch.name {
                validate_name("name", &name)?;
                label.name = name;
            }
            if let Field::Set(description) = patch.description {
                label.description = description;
            }
            store::update_label(conn, kind, &label)?;
            Ok(label)
        })
    }

    fn delete_label(&mut self, kind: LabelKind, id: i64) -> Result<LabelRow, TrackError> {
        self.write(|conn| {
            let label = store::get_label(conn, kind, id)?
                .ok_or_else(|| TrackError::not_found(kind.entity(), id))?;
            store::delete_label(conn, kind, id)?;
            tracing::debug!(entity = kind.entity(), id, "deleted label");
            Ok(label)
        })
    }
}
