//! Moving logs between running, paused and stopped.
//!
//! Every function here runs inside the caller's write transaction and takes
//! the resolved request time explicitly. None of them commit; the caller
//! decides what happens to the transaction.
//!
//! At most one record may be open across the store. Operations that open a
//! record close every other open record first.

use chrono::{DateTime, Utc};
use mt_core::{DynamicId, Log, LogFilter, NewLog, Record, normalize_flags, types::validate_name};
use rusqlite::Connection;

use crate::TrackError;
use crate::locator;
use crate::query::Column;
use crate::store::{self, LabelKind, LogColumns};

/// Whether unknown category or task names may be created on the fly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateMissing {
    pub category: bool,
    pub task: bool,
}

impl CreateMissing {
    pub const fn both() -> Self {
        Self {
            category: true,
            task: true,
        }
    }
}

/// Result of stopping a single log.
#[derive(Debug, Clone, PartialEq)]
pub struct StopOutcome {
    pub log: Log,
    /// The log that took over the open record, if any.
    pub resumed: Option<Log>,
}

/// Result of a resume attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResumeOutcome {
    Resumed(Log),
    /// The log was stopped yet held an open record; the flag was repaired
    /// and the changes should be kept even though the call reports an error.
    Repaired(i64),
}

/// Looks up a task or category by name, creating it if allowed.
pub(crate) fn resolve_label(
    conn: &Connection,
    kind: LabelKind,
    name: Option<&str>,
    create: bool,
) -> Result<Option<i64>, TrackError> {
    let Some(name) = name else {
        return Ok(None);
    };
    if let Some(label) = store::find_label_by_name(conn, kind, name)? {
        return Ok(Some(label.id));
    }
    if !create {
        return Err(TrackError::not_found(kind.entity(), name));
    }
    validate_name(kind.entity(), name)?;
    let label = store::insert_label(conn, kind, name, None)?;
    tracing::debug!(entity = kind.entity(), id = label.id, name, "created label");
    Ok(Some(label.id))
}

/// Closes every open record at `at`.
///
/// Returns the ids of the logs whose record was closed.
pub(crate) fn close_open_records(
    conn: &Connection,
    at: DateTime<Utc>,
) -> Result<Vec<i64>, TrackError> {
    let mut closed = Vec::new();
    for mut record in store::open_records(conn)? {
        store::close_record(conn, &mut record, at)?;
        closed.push(record.log_id);
    }
    Ok(closed)
}

/// Inserts a running log for `new`. Every record must already be closed.
fn insert_running_log(
    conn: &Connection,
    new: &NewLog,
    category_id: Option<i64>,
    task_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<Log, TrackError> {
    let log_id = store::insert_log(
        conn,
        &LogColumns {
            category_id,
            task_id,
            meta: new.meta.clone(),
            stopped: false,
            name: new.name.clone().unwrap_or_default(),
            description: new.description.clone(),
        },
    )?;
    if let Some(flags) = &new.flags {
        store::replace_flags(conn, log_id, &normalize_flags(flags.iter().cloned()))?;
    }
    let record = store::insert_record(conn, log_id, None, at, None)?;
    tracing::debug!(log_id, record_id = record.id, %at, "started log");
    store::require_log(conn, log_id)
}

fn resolve_new_log_labels(
    conn: &Connection,
    new: &NewLog,
    create: CreateMissing,
) -> Result<(Option<i64>, Option<i64>), TrackError> {
    let category_id = resolve_label(
        conn,
        LabelKind::Category,
        new.category.as_deref(),
        create.category,
    )?;
    let task_id = resolve_label(conn, LabelKind::Task, new.task.as_deref(), create.task)?;
    Ok((category_id, task_id))
}

/// Starts a new log, pausing whatever was running.
pub(crate) fn start_log(
    conn: &Connection,
    new: &NewLog,
    create: CreateMissing,
    at: DateTime<Utc>,
) -> Result<Log, TrackError> {
    let (category_id, task_id) = resolve_new_log_labels(conn, new, create)?;
    close_open_records(conn, at)?;
    insert_running_log(conn, new, category_id, task_id, at)
}

/// Starts a new log, stopping whatever was running.
pub(crate) fn next_log(
    conn: &Connection,
    new: &NewLog,
    create: CreateMissing,
    at: DateTime<Utc>,
) -> Result<Log, TrackError> {
    let (category_id, task_id) = resolve_new_log_labels(conn, new, create)?;
    if let Some(mut active) = locator::find_active_record(conn)? {
        store::close_record(conn, &mut active, at)?;
        store::set_stopped(conn, active.log_id, true)?;
        tracing::debug!(log_id = active.log_id, %at, "stopped log");
    }
    insert_running_log(conn, new, category_id, task_id, at)
}

pub(crate) fn pause_log(conn: &Connection, log_id: i64, at: DateTime<Utc>) -> Result<Log, TrackError> {
    let log = store::require_log(conn, log_id)?;
    if log.stopped {
        return Err(TrackError::AlreadyStopped { log_id });
    }
    let Some(mut open) = log.open_record().cloned() else {
        return Err(TrackError::AlreadyPaused { log_id });
    };
    store::close_record(conn, &mut open, at)?;
    tracing::debug!(log_id, %at, "paused log");
    store::require_log(conn, log_id)
}

pub(crate) fn pause_active_log(conn: &Connection, at: DateTime<Utc>) -> Result<Log, TrackError> {
    let active = locator::find_active_record(conn)?.ok_or(TrackError::NoActiveLog)?;
    pause_log(conn, active.log_id, at)
}

/// Stops the referenced log. If it was running, the most recently active
/// remaining log takes over.
pub(crate) fn stop_log(
    conn: &Connection,
    id: DynamicId,
    at: DateTime<Utc>,
) -> Result<StopOutcome, TrackError> {
    let log_id = locator::resolve_dynamic_id(conn, id)?;
    let log = store::require_log(conn, log_id)?;
    if log.stopped {
        return Err(TrackError::AlreadyStopped { log_id });
    }
    stop_and_hand_over(conn, &log, at)
}

/// Stops the log owning the open record and resumes the next candidate.
pub(crate) fn stop_active_log(conn: &Connection, at: DateTime<Utc>) -> Result<StopOutcome, TrackError> {
    let active = locator::find_active_record(conn)?.ok_or(TrackError::NoActiveLog)?;
    let log = store::require_log(conn, active.log_id)?;
    if log.stopped {
        tracing::warn!(log_id = log.id, "stopped log owns the open record");
    }
    stop_and_hand_over(conn, &log, at)
}

fn stop_and_hand_over(conn: &Connection, log: &Log, at: DateTime<Utc>) -> Result<StopOutcome, TrackError> {
    let was_active = match log.open_record().cloned() {
        Some(mut open) => {
            store::close_record(conn, &mut open, at)?;
            true
        }
        None => false,
    };
    store::set_stopped(conn, log.id, true)?;
    tracing::debug!(log_id = log.id, was_active, %at, "stopped log");

    let resumed = if was_active {
        auto_resume(conn, at)?
    } else {
        None
    };
    Ok(StopOutcome {
        log: store::require_log(conn, log.id)?,
        resumed,
    })
}

/// Opens a record on the most recently active log that is not stopped.
///
/// Assumes nothing is running. A candidate that already holds an open record
/// is left alone.
fn auto_resume(conn: &Connection, at: DateTime<Utc>) -> Result<Option<Log>, TrackError> {
    let Some(&log_id) = locator::non_stopped_log_ids(conn)?.first() else {
        tracing::debug!("no log to resume");
        return Ok(None);
    };
    let log = store::require_log(conn, log_id)?;
    if log.open_record().is_some() {
        tracing::warn!(log_id, "resume candidate already has an open record; skipping");
        return Ok(None);
    }
    let record = store::insert_record(conn, log_id, None, at, None)?;
    tracing::debug!(log_id, record_id = record.id, %at, "resumed log");
    store::require_log(conn, log_id).map(Some)
}

/// Stops every log matching `filter` that is not stopped yet.
///
/// Nothing is resumed afterwards. A category or task name that matches no
/// label yields an empty list rather than an error.
pub(crate) fn stop_all_logs(
    conn: &Connection,
    filter: &LogFilter,
    at: DateTime<Utc>,
) -> Result<Vec<Log>, TrackError> {
    let Some(query) = locator::filtered_query(conn, filter)? else {
        return Ok(Vec::new());
    };
    let logs = store::load_logs(conn, &query.eq(Column::Stopped, false).ids(conn)?)?;
    if logs.is_empty() {
        return Err(TrackError::NothingToStop);
    }

    let mut stopped = Vec::with_capacity(logs.len());
    for log in logs {
        let log_id = log.id;
        for mut record in log.records.into_iter().filter(Record::is_open) {
            store::close_record(conn, &mut record, at)?;
        }
        store::set_stopped(conn, log_id, true)?;
        tracing::debug!(log_id, %at, "stopped log");
        stopped.push(store::require_log(conn, log_id)?);
    }
    Ok(stopped)
}

/// Resumes the referenced log, pausing whatever was running.
pub(crate) fn resume_log(
    conn: &Connection,
    id: DynamicId,
    at: DateTime<Utc>,
) -> Result<ResumeOutcome, TrackError> {
    let log_id = locator::resolve_dynamic_id(conn, id)?;
    let log = store::require_log(conn, log_id)?;
    let was_stopped = log.stopped;
    let had_open = log.open_record().is_some();

    close_open_records(conn, at)?;
    if was_stopped {
        store::set_stopped(conn, log_id, false)?;
    }

    if had_open {
        if was_stopped {
            tracing::warn!(log_id, "stopped log had an open record; marked not stopped");
            return Ok(ResumeOutcome::Repaired(log_id));
        }
        return Err(TrackError::AlreadyRunning { log_id });
    }

    let record = store::insert_record(conn, log_id, None, at, None)?;
    tracing::debug!(log_id, record_id = record.id, %at, "resumed log");
    store::require_log(conn, log_id).map(ResumeOutcome::Resumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};
    use mt_core::LogState;
    use rusqlite::params;

    use crate::{Database, format_timestamp};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, minute, 0).unwrap()
    }

    fn named(name: &str) -> NewLog {
        NewLog {
            name: Some(name.to_string()),
            ..NewLog::default()
        }
    }

    fn open_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM records WHERE end_at IS NULL", [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    fn state(conn: &Connection, log_id: i64) -> LogState {
        store::require_log(conn, log_id).unwrap().state()
    }

    #[test]
    fn starting_a_second_log_pauses_the_first() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();

        assert_eq!(state(conn, a.id), LogState::Paused);
        assert_eq!(b.state(), LogState::Running);
        assert_eq!(b.name, "b");
        let a = store::require_log(conn, a.id).unwrap();
        assert_eq!(a.records[0].end, Some(at(10, 0)));
        assert_eq!(open_count(conn), 1);
    }

    #[test]
    fn stopping_the_running_log_resumes_the_last_paused_one() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();

        let outcome = stop_log(conn, DynamicId::Literal(b.id), at(11, 0)).unwrap();

        assert_eq!(outcome.log.state(), LogState::Stopped);
        let resumed = outcome.resumed.unwrap();
        assert_eq!(resumed.id, a.id);
        assert_eq!(resumed.state(), LogState::Running);
        assert_eq!(resumed.records.len(), 2);
        assert_eq!(resumed.records[1].start, at(11, 0));
        assert_eq!(open_count(conn), 1);
    }

    #[test]
    fn stopping_a_paused_log_resumes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();

        let outcome = stop_log(conn, DynamicId::Literal(a.id), at(11, 0)).unwrap();
        assert!(outcome.resumed.is_none());
        assert_eq!(state(conn, b.id), LogState::Running);

        let err = stop_log(conn, DynamicId::Literal(a.id), at(12, 0)).unwrap_err();
        assert!(matches!(err, TrackError::AlreadyStopped { .. }));
    }

    #[test]
    fn stop_active_goes_idle_without_candidates() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        assert!(matches!(
            stop_active_log(conn, at(8, 0)),
            Err(TrackError::NoActiveLog)
        ));

        start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let outcome = stop_active_log(conn, at(10, 0)).unwrap();

        assert!(outcome.resumed.is_none());
        assert_eq!(open_count(conn), 0);
        assert_eq!(outcome.log.total_duration(at(23, 0)), Duration::hours(1));
    }

    #[test]
    fn next_stops_the_running_log_instead_of_pausing_it() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = next_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();

        assert_eq!(state(conn, a.id), LogState::Stopped);
        assert_eq!(b.state(), LogState::Running);
    }

    #[test]
    fn labels_must_exist_unless_creation_is_allowed() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let running = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let new = NewLog {
            category: Some("work".to_string()),
            task: Some("review".to_string()),
            flags: Some(vec!["b".to_string(), "a".to_string(), "b".to_string()]),
            ..named("b")
        };

        let err = start_log(conn, &new, CreateMissing::default(), at(10, 0)).unwrap_err();
        assert!(matches!(err, TrackError::NotFound { entity: "category", .. }));
        // Nothing was swept by the failed call.
        assert_eq!(state(conn, running.id), LogState::Running);

        let log = start_log(conn, &new, CreateMissing::both(), at(10, 0)).unwrap();
        assert!(log.category_id.is_some());
        assert!(log.task_id.is_some());
        assert_eq!(log.flags, vec!["a", "b"]);
    }

    #[test]
    fn start_before_the_open_record_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        start_log(conn, &named("a"), CreateMissing::default(), at(10, 0)).unwrap();
        let err = start_log(conn, &named("b"), CreateMissing::default(), at(9, 0)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidTime);
    }

    #[test]
    fn pausing_twice_fails_the_second_time() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();

        let paused = pause_active_log(conn, at(9, 30)).unwrap();
        assert_eq!(paused.id, a.id);
        assert_eq!(paused.state(), LogState::Paused);

        assert!(matches!(
            pause_log(conn, a.id, at(9, 45)),
            Err(TrackError::AlreadyPaused { .. })
        ));
        assert!(matches!(
            pause_active_log(conn, at(9, 45)),
            Err(TrackError::NoActiveLog)
        ));
    }

    #[test]
    fn pausing_a_stopped_log_reports_stopped() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        stop_active_log(conn, at(10, 0)).unwrap();
        assert!(matches!(
            pause_log(conn, a.id, at(11, 0)),
            Err(TrackError::AlreadyStopped { .. })
        ));
    }

    #[test]
    fn spans_add_up_to_elapsed_time() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(9, 40)).unwrap();
        let ResumeOutcome::Resumed(_) = resume_log(conn, DynamicId::Literal(a.id), at(10, 0)).unwrap()
        else {
            panic!("expected resume");
        };
        stop_active_log(conn, at(11, 0)).unwrap();
        stop_active_log(conn, at(11, 30)).unwrap();

        let a = store::require_log(conn, a.id).unwrap();
        let b = store::require_log(conn, b.id).unwrap();
        let now = at(23, 0);
        assert_eq!(
            a.total_duration(now) + b.total_duration(now),
            at(11, 30) - at(9, 0)
        );
        assert_eq!(open_count(conn), 0);
    }

    #[test]
    fn resume_reopens_a_stopped_log() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        stop_active_log(conn, at(10, 0)).unwrap();

        let ResumeOutcome::Resumed(log) = resume_log(conn, DynamicId::LATEST, at(11, 0)).unwrap()
        else {
            panic!("expected resume");
        };
        assert_eq!(log.id, a.id);
        assert_eq!(log.state(), LogState::Running);
    }

    #[test]
    fn resuming_a_running_log_fails() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let err = resume_log(conn, DynamicId::Literal(a.id), at(10, 0)).unwrap_err();
        assert!(matches!(err, TrackError::AlreadyRunning { .. }));
    }

    #[test]
    fn resuming_a_stopped_log_with_an_open_record_repairs_it() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        store::set_stopped(conn, a.id, true).unwrap();

        let outcome = resume_log(conn, DynamicId::Literal(a.id), at(10, 0)).unwrap();
        assert_eq!(outcome, ResumeOutcome::Repaired(a.id));

        let log = store::require_log(conn, a.id).unwrap();
        assert_eq!(log.state(), LogState::Paused);
        assert_eq!(log.records[0].end, Some(at(10, 0)));
    }

    #[test]
    fn stop_active_handles_a_stopped_log_holding_the_open_record() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();
        store::set_stopped(conn, b.id, true).unwrap();

        let outcome = stop_active_log(conn, at(11, 0)).unwrap();
        assert_eq!(outcome.log.id, b.id);
        assert_eq!(outcome.log.state(), LogState::Stopped);
        assert_eq!(outcome.resumed.map(|log| log.id), Some(a.id));
        assert_eq!(open_count(conn), 1);
    }

    #[test]
    fn auto_resume_skips_a_candidate_holding_an_open_record() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();
        stop_log(conn, DynamicId::Literal(b.id), at(11, 0)).unwrap();
        // a was resumed, so the newest candidate already holds the open record.
        assert_eq!(state(conn, a.id), LogState::Running);

        assert!(auto_resume(conn, at(12, 0)).unwrap().is_none());
        assert_eq!(open_count(conn), 1);
    }

    #[test]
    fn stop_all_stops_matching_logs_without_resuming() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let work = NewLog {
            category: Some("work".to_string()),
            ..named("a")
        };
        let a = start_log(conn, &work, CreateMissing::both(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();
        let c = start_log(conn, &work, CreateMissing::default(), at(11, 0)).unwrap();

        let filter = LogFilter {
            category: Some("work".to_string()),
            ..LogFilter::default()
        };
        let stopped = stop_all_logs(conn, &filter, at(12, 0)).unwrap();
        let mut ids: Vec<i64> = stopped.iter().map(|log| log.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(state(conn, b.id), LogState::Paused);
        assert_eq!(open_count(conn), 0);

        assert!(matches!(
            stop_all_logs(conn, &filter, at(13, 0)),
            Err(TrackError::NothingToStop)
        ));
        let unknown = LogFilter {
            category: Some("leisure".to_string()),
            ..LogFilter::default()
        };
        assert!(stop_all_logs(conn, &unknown, at(13, 0)).unwrap().is_empty());
    }

    #[test]
    fn stop_all_by_flag() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let flagged = NewLog {
            flags: Some(vec!["billable".to_string()]),
            ..named("a")
        };
        let a = start_log(conn, &flagged, CreateMissing::default(), at(9, 0)).unwrap();
        let b = start_log(conn, &named("b"), CreateMissing::default(), at(10, 0)).unwrap();

        let filter = LogFilter {
            flags: vec!["billable".to_string()],
            ..LogFilter::default()
        };
        let stopped = stop_all_logs(conn, &filter, at(11, 0)).unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].id, a.id);
        assert_eq!(state(conn, b.id), LogState::Running);
    }

    #[test]
    fn stored_timestamps_keep_the_request_time() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let a = start_log(conn, &named("a"), CreateMissing::default(), at(9, 15)).unwrap();
        let stored: String = conn
            .query_row(
                "SELECT start_at FROM records WHERE log_id = ?1",
                params![a.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, format_timestamp(at(9, 15)));
    }
}
