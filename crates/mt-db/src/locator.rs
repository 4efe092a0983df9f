//! Finding the active record and resolving signed log references.

use chrono::{DateTime, Utc};
use mt_core::{DynamicId, LogFilter, Record, SortOrder};
use rusqlite::Connection;
use rusqlite::types::Value;

use crate::query::{Column, Condition, LogQuery, Op};
use crate::store::{self, LabelKind};
use crate::{TrackError, format_timestamp};

/// The open record, if any.
///
/// Should there ever be more than one, the most recently started wins.
pub(crate) fn find_active_record(conn: &Connection) -> Result<Option<Record>, TrackError> {
    let mut open = store::open_records(conn)?;
    if open.len() > 1 {
        tracing::warn!(count = open.len(), "more than one open record");
    }
    Ok(if open.is_empty() {
        None
    } else {
        Some(open.swap_remove(0))
    })
}

/// Logs that are neither stopped nor running, most recently active first.
pub(crate) fn paused_log_ids(conn: &Connection) -> Result<Vec<i64>, TrackError> {
    LogQuery::recent_first()
        .eq(Column::Stopped, false)
        .filter(Condition::NoOpenRecord)
        .ids(conn)
}

/// Every log that is not stopped, most recently active first.
///
/// Running logs are included so that callers can notice a log that should
/// not be running.
pub(crate) fn non_stopped_log_ids(conn: &Connection) -> Result<Vec<i64>, TrackError> {
    LogQuery::recent_first()
        .eq(Column::Stopped, false)
        .ids(conn)
}

/// Maps a signed reference to a log id.
///
/// Negative references count back through all logs by recency; logs without
/// records sort last.
pub(crate) fn resolve_dynamic_id(conn: &Connection, id: DynamicId) -> Result<i64, TrackError> {
    match id {
        DynamicId::Literal(log_id) => {
            if store::load_log(conn, log_id)?.is_none() {
                return Err(TrackError::not_found("log", log_id));
            }
            Ok(log_id)
        }
        DynamicId::Back(offset) => LogQuery::recent_first()
            .offset(offset)
            .first_id(conn)?
            .ok_or_else(|| TrackError::not_found("log", id)),
    }
}

/// Translates a filter into a query.
///
/// Returns `None` when a category or task name matches no label, since no log
/// can carry it. Unknown ids are an error.
pub(crate) fn filtered_query(
    conn: &Connection,
    filter: &LogFilter,
) -> Result<Option<LogQuery>, TrackError> {
    filter.validate()?;
    let mut query = match filter.order {
        SortOrder::Desc => LogQuery::recent_first(),
        SortOrder::Asc => LogQuery::oldest_first(),
    };

    for (kind, column, id, name) in [
        (
            LabelKind::Category,
            Column::CategoryId,
            filter.category_id,
            filter.category.as_deref(),
        ),
        (
            LabelKind::Task,
            Column::TaskId,
            filter.task_id,
            filter.task.as_deref(),
        ),
    ] {
        if let Some(id) = id {
            if store::get_label(conn, kind, id)?.is_none() {
                return Err(TrackError::not_found(kind.entity(), id));
            }
            query = query.eq(column, id);
        }
        if let Some(name) = name {
            let Some(label) = store::find_label_by_name(conn, kind, name)? else {
                return Ok(None);
            };
            query = query.eq(column, label.id);
        }
    }

    if let Some(stopped) = filter.stopped {
        query = query.eq(Column::Stopped, stopped);
    }
    if !filter.flags.is_empty() {
        let flags = filter.flags.iter().cloned().map(Value::from).collect();
        query = query.filter(Condition::In(Column::Flag, flags));
    }
    if let Some(since) = filter.since {
        query = query.filter(touches(Op::Ge, since));
    }
    if let Some(until) = filter.until {
        query = query.filter(touches(Op::Le, until));
    }
    Ok(Some(query))
}

/// A record starting or ending on the `op` side of `at`.
fn touches(op: Op, at: DateTime<Utc>) -> Condition {
    let at = Value::from(format_timestamp(at));
    Condition::AnyOf(vec![
        Condition::Compare(Column::RecordStart, op, at.clone()),
        Condition::Compare(Column::RecordEnd, op, at),
    ])
}
