//! Direct edits: partial log updates, record CRUD, split and merge.

use chrono::{DateTime, Utc};
use mt_core::types::validate_interval;
use mt_core::{
    DynamicId, Field, Log, LogChange, LogDraft, LogPatch, NewRecord, Record, RecordPatch,
    RecordUpdate, ValidationError, merge_fields, normalize_flags, plan_split,
};
use rusqlite::Connection;

use crate::lifecycle::{CreateMissing, resolve_label};
use crate::store::{self, LabelKind, LogColumns};
use crate::{TrackError, locator};

/// Refuses to leave a second record open.
///
/// `record_id` is the record about to be open, if it already exists.
fn ensure_can_open(conn: &Connection, record_id: Option<i64>) -> Result<(), TrackError> {
    match locator::find_active_record(conn)? {
        Some(open) if Some(open.id) != record_id => Err(TrackError::AnotherRecordOpen {
            open_record_id: open.id,
        }),
        _ => Ok(()),
    }
}

/// Checks a record's interval and the single-open rule, then writes it back.
fn save_record(conn: &Connection, record: &Record) -> Result<(), TrackError> {
    validate_interval(record.start, record.end)?;
    if record.is_open() {
        ensure_can_open(conn, Some(record.id))?;
    }
    store::update_record(conn, record)
}

fn insert_checked_record(
    conn: &Connection,
    log_id: i64,
    new: &NewRecord,
) -> Result<Record, TrackError> {
    validate_interval(new.start, new.end)?;
    if new.end.is_none() {
        ensure_can_open(conn, None)?;
    }
    store::insert_record(conn, log_id, new.meta.as_ref(), new.start, new.end)
}

/// Creates a log exactly as described; other logs are not touched.
pub(crate) fn create_log(conn: &Connection, draft: &LogDraft) -> Result<Log, TrackError> {
    for (kind, id) in [
        (LabelKind::Category, draft.category_id),
        (LabelKind::Task, draft.task_id),
    ] {
        if let Some(id) = id {
            if store::get_label(conn, kind, id)?.is_none() {
                return Err(TrackError::not_found(kind.entity(), id));
            }
        }
    }
    let log_id = store::insert_log(
        conn,
        &LogColumns {
            category_id: draft.category_id,
            task_id: draft.task_id,
            meta: draft.meta.clone(),
            stopped: draft.stopped,
            name: draft.name.clone(),
            description: draft.description.clone(),
        },
    )?;
    store::replace_flags(conn, log_id, &normalize_flags(draft.flags.iter().cloned()))?;
    for record in &draft.records {
        insert_checked_record(conn, log_id, record)?;
    }
    tracing::debug!(log_id, records = draft.records.len(), "created log");
    store::require_log(conn, log_id)
}

/// Applies a partial update to a log.
///
/// Nested records are upserted: entries without an id become new records on
/// this log (starting at `at` unless given), entries with an id must name a
/// record of this log.
pub(crate) fn update_log(
    conn: &Connection,
    log_id: i64,
    patch: LogPatch,
    create: CreateMissing,
    at: DateTime<Utc>,
) -> Result<Log, TrackError> {
    let mut log = store::require_log(conn, log_id)?;
    for change in patch.into_changes() {
        match change {
            LogChange::Category(name) => {
                log.category_id =
                    resolve_label(conn, LabelKind::Category, name.as_deref(), create.category)?;
            }
            LogChange::Task(name) => {
                log.task_id = resolve_label(conn, LabelKind::Task, name.as_deref(), create.task)?;
            }
            LogChange::Flags(flags) => {
                log.flags = normalize_flags(flags.unwrap_or_default());
                store::replace_flags(conn, log_id, &log.flags)?;
            }
            LogChange::Meta(meta) => log.meta = meta,
            LogChange::Stopped(stopped) => log.stopped = stopped,
            LogChange::Name(name) => log.name = name,
            LogChange::Description(description) => log.description = description,
            LogChange::Records(records) => {
                for record in records {
                    upsert_record(conn, log_id, record, at)?;
                }
            }
        }
    }
    store::update_log(conn, &log)?;
    tracing::debug!(log_id, "updated log");
    store::require_log(conn, log_id)
}

fn upsert_record(
    conn: &Connection,
    log_id: i64,
    patch: RecordPatch,
    at: DateTime<Utc>,
) -> Result<(), TrackError> {
    let Some(record_id) = patch.id else {
        let new = NewRecord {
            meta: patch.meta.into_option().flatten(),
            start: patch.start.into_option().unwrap_or(at),
            end: patch.end.into_option().flatten(),
        };
        insert_checked_record(conn, log_id, &new)?;
        return Ok(());
    };

    let mut record = store::get_record(conn, record_id)?
        .filter(|record| record.log_id == log_id)
        .ok_or_else(|| TrackError::not_found("record", record_id))?;
    if let Field::Set(meta) = patch.meta {
        record.meta = meta;
    }
    if let Field::Set(start) = patch.start {
        record.start = start;
    }
    if let Field::Set(end) = patch.end {
        record.end = end;
    }
    save_record(conn, &record)
}

/// Deletes a log with its records and flags, returning what was deleted.
pub(crate) fn delete_log(conn: &Connection, id: DynamicId) -> Result<Log, TrackError> {
    let log_id = locator::resolve_dynamic_id(conn, id)?;
    let log = store::require_log(conn, log_id)?;
    store::delete_log(conn, log_id)?;
    tracing::debug!(log_id, records = log.records.len(), "deleted log");
    Ok(log)
}

pub(crate) fn create_record(
    conn: &Connection,
    log_id: i64,
    new: &NewRecord,
) -> Result<Record, TrackError> {
    store::require_log(conn, log_id)?;
    let record = insert_checked_record(conn, log_id, new)?;
    tracing::debug!(log_id, record_id = record.id, "created record");
    Ok(record)
}

pub(crate) fn update_record(
    conn: &Connection,
    record_id: i64,
    update: RecordUpdate,
) -> Result<Record, TrackError> {
    let mut record =
        store::get_record(conn, record_id)?.ok_or_else(|| TrackError::not_found("record", record_id))?;
    if let Field::Set(log_id) = update.log_id {
        store::require_log(conn, log_id)?;
        record.log_id = log_id;
    }
    if let Field::Set(meta) = update.meta {
        record.meta = meta;
    }
    if let Field::Set(start) = update.start {
        record.start = start;
    }
    if let Field::Set(end) = update.end {
        record.end = end;
    }
    save_record(conn, &record)?;
    tracing::debug!(record_id, log_id = record.log_id, "updated record");
    Ok(record)
}

/// Deletes a record; a log left without records is deleted as well.
pub(crate) fn delete_record(conn: &Connection, record_id: i64) -> Result<Record, TrackError> {
    let record =
        store::get_record(conn, record_id)?.ok_or_else(|| TrackError::not_found("record", record_id))?;
    store::delete_record(conn, record_id)?;
    if store::count_records(conn, record.log_id)? == 0 {
        store::delete_log(conn, record.log_id)?;
        tracing::debug!(log_id = record.log_id, "deleted empty log");
    }
    tracing::debug!(record_id, log_id = record.log_id, "deleted record");
    Ok(record)
}

/// Cuts a log in two at `at`.
///
/// The original keeps everything before `at` and is stopped. A new sibling
/// with the same labels, meta and name receives everything from `at` on,
/// including the open record if the original had it.
pub(crate) fn split_log(
    conn: &Connection,
    id: DynamicId,
    at: DateTime<Utc>,
) -> Result<(Log, Log), TrackError> {
    let log_id = locator::resolve_dynamic_id(conn, id)?;
    let log = store::require_log(conn, log_id)?;
    let plan = plan_split(&log.records, at);

    let sibling_id = store::insert_log(conn, &LogColumns::from(&log))?;
    store::set_stopped(conn, log_id, true)?;

    // Truncate before carrying so an open record is closed before its tail opens.
    for mut record in log
        .records
        .iter()
        .filter(|record| plan.truncate.contains(&record.id))
        .cloned()
    {
        store::close_record(conn, &mut record, at)?;
    }
    for carried in &plan.carry {
        store::insert_record(
            conn,
            sibling_id,
            carried.meta.as_ref(),
            carried.start,
            carried.end,
        )?;
    }
    for record_id in &plan.moved {
        store::move_record(conn, *record_id, sibling_id)?;
    }
    tracing::debug!(
        log_id,
        sibling_id,
        %at,
        sliced = plan.truncate.len(),
        moved = plan.moved.len(),
        "split log"
    );

    Ok((
        store::require_log(conn, log_id)?,
        store::require_log(conn, sibling_id)?,
    ))
}

/// Folds `other_id` into `log_id` and deletes it.
pub(crate) fn merge_logs(conn: &Connection, log_id: i64, other_id: i64) -> Result<Log, TrackError> {
    if log_id == other_id {
        return Err(ValidationError::SelfMerge { log_id }.into());
    }
    let mut log = store::require_log(conn, log_id)?;
    let other = store::require_log(conn, other_id)?;

    let merged = merge_fields(&log, &other);
    let moved = store::move_all_records(conn, other_id, log_id)?;
    store::delete_log(conn, other_id)?;

    log.name = merged.name;
    log.description = merged.description;
    log.stopped = merged.stopped;
    log.category_id = merged.category_id;
    log.task_id = merged.task_id;
    log.meta = merged.meta;
    store::update_log(conn, &log)?;
    store::replace_flags(conn, log_id, &merged.flags)?;
    tracing::debug!(log_id, other_id, moved, "merged logs");

    store::require_log(conn, log_id)
}
