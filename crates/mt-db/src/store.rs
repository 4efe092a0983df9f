//! Row-level persistence for every entity.
//!
//! Functions take a `&Connection` so they run the same inside or outside a
//! transaction (`Transaction` derefs to `Connection`).

use chrono::{DateTime, Utc};
use mt_core::{Category, Log, Meta, Record, Task};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::{TrackError, format_timestamp, parse_timestamp};

/// Tasks and categories share one table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelKind {
    Task,
    Category,
}

impl LabelKind {
    const fn table(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Category => "categories",
        }
    }

    pub(crate) const fn entity(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Category => "category",
        }
    }
}

/// A task or category row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LabelRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl From<LabelRow> for Task {
    fn from(row: LabelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

impl From<LabelRow> for Category {
    fn from(row: LabelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<LabelRow> {
    Ok(LabelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

pub(crate) fn insert_label(
    conn: &Connection,
    kind: LabelKind,
    name: &str,
    description: Option<&str>,
) -> Result<LabelRow, TrackError> {
    if find_label_by_name(conn, kind, name)?.is_some() {
        return Err(TrackError::Duplicate {
            entity: kind.entity(),
            name: name.to_string(),
        });
    }
    conn.execute(
        &format!("INSERT INTO {} (name, description) VALUES (?, ?)", kind.table()),
        params![name, description],
    )?;
    Ok(LabelRow {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(str::to_string),
    })
}

pub(crate) fn get_label(
    conn: &Connection,
    kind: LabelKind,
    id: i64,
) -> Result<Option<LabelRow>, TrackError> {
    let row = conn
        .query_row(
            &format!("SELECT id, name, description FROM {} WHERE id = ?", kind.table()),
            [id],
            label_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn find_label_by_name(
    conn: &Connection,
    kind: LabelKind,
    name: &str,
) -> Result<Option<LabelRow>, TrackError> {
    let row = conn
        .query_row(
            &format!("SELECT id, name, description FROM {} WHERE name = ?", kind.table()),
            [name],
            label_from_row,
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn list_labels(conn: &Connection, kind: LabelKind) -> Result<Vec<LabelRow>, TrackError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, description FROM {} ORDER BY name ASC, id ASC",
        kind.table()
    ))?;
    let rows = stmt.query_map([], label_from_row)?;
    let mut labels = Vec::new();
    for row in rows {
        labels.push(row?);
    }
    Ok(labels)
}

pub(crate) fn update_label(
    conn: &Connection,
    kind: LabelKind,
    label: &LabelRow,
) -> Result<(), TrackError> {
    if let Some(existing) = find_label_by_name(conn, kind, &label.name)? {
        if existing.id != label.id {
            return Err(TrackError::Duplicate {
                entity: kind.entity(),
                name: label.name.clone(),
            });
        }
    }
    conn.execute(
        &format!("UPDATE {} SET name = ?, description = ? WHERE id = ?", kind.table()),
        params![label.name, label.description, label.id],
    )?;
    Ok(())
}

pub(crate) fn delete_label(conn: &Connection, kind: LabelKind, id: i64) -> Result<(), TrackError> {
    conn.execute(&format!("DELETE FROM {} WHERE id = ?", kind.table()), [id])?;
    Ok(())
}

// ========== Meta ==========

fn encode_meta(meta: Option<&Meta>) -> Result<Option<String>, TrackError> {
    meta.map(serde_json::to_string)
        .transpose()
        .map_err(TrackError::from)
}

fn decode_meta(
    raw: Option<String>,
    entity: &'static str,
    id: i64,
) -> Result<Option<Meta>, TrackError> {
    raw.map(|text| {
        serde_json::from_str::<Meta>(&text).map_err(|err| TrackError::Corrupt {
            entity,
            id,
            what: "meta",
            message: err.to_string(),
        })
    })
    .transpose()
}

// ========== Records ==========

const RECORD_COLUMNS: &str = "id, log_id, meta, start_at, end_at";

#[derive(Debug)]
struct RecordRow {
    id: i64,
    log_id: i64,
    meta: Option<String>,
    start_at: String,
    end_at: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            log_id: row.get(1)?,
            meta: row.get(2)?,
            start_at: row.get(3)?,
            end_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<Record, TrackError> {
        let start = parse_timestamp(&self.start_at, "record", self.id)?;
        let end = self
            .end_at
            .as_deref()
            .map(|end| parse_timestamp(end, "record", self.id))
            .transpose()?;
        Ok(Record {
            id: self.id,
            log_id: self.log_id,
            meta: decode_meta(self.meta, "record", self.id)?,
            start,
            end,
        })
    }
}

fn collect_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Record>, TrackError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, RecordRow::from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

pub(crate) fn insert_record(
    conn: &Connection,
    log_id: i64,
    meta: Option<&Meta>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Result<Record, TrackError> {
    conn.execute(
        "INSERT INTO records (log_id, meta, start_at, end_at) VALUES (?, ?, ?, ?)",
        params![
            log_id,
            encode_meta(meta)?,
            format_timestamp(start),
            end.map(format_timestamp),
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_record(conn, id)?.ok_or_else(|| TrackError::not_found("record", id))
}

pub(crate) fn get_record(conn: &Connection, id: i64) -> Result<Option<Record>, TrackError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?"),
            [id],
            RecordRow::from_row,
        )
        .optional()?;
    row.map(RecordRow::into_record).transpose()
}

pub(crate) fn records_of_log(conn: &Connection, log_id: i64) -> Result<Vec<Record>, TrackError> {
    collect_records(
        conn,
        &format!("SELECT {RECORD_COLUMNS} FROM records WHERE log_id = ? ORDER BY start_at ASC, id ASC"),
        [log_id],
    )
}

/// Every open record, most recently started first.
pub(crate) fn open_records(conn: &Connection) -> Result<Vec<Record>, TrackError> {
    collect_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE end_at IS NULL ORDER BY start_at DESC, id DESC"
        ),
        [],
    )
}

/// Writes every column of `record` back.
pub(crate) fn update_record(conn: &Connection, record: &Record) -> Result<(), TrackError> {
    conn.execute(
        "UPDATE records SET log_id = ?, meta = ?, start_at = ?, end_at = ? WHERE id = ?",
        params![
            record.log_id,
            encode_meta(record.meta.as_ref())?,
            format_timestamp(record.start),
            record.end.map(format_timestamp),
            record.id,
        ],
    )?;
    Ok(())
}

/// Closes `record` at `at`, refusing an end before its start.
pub(crate) fn close_record(
    conn: &Connection,
    record: &mut Record,
    at: DateTime<Utc>,
) -> Result<(), TrackError> {
    record.close(at)?;
    conn.execute(
        "UPDATE records SET end_at = ? WHERE id = ?",
        params![format_timestamp(at), record.id],
    )?;
    tracing::debug!(record_id = record.id, log_id = record.log_id, %at, "closed record");
    Ok(())
}

pub(crate) fn move_record(conn: &Connection, record_id: i64, log_id: i64) -> Result<(), TrackError> {
    conn.execute(
        "UPDATE records SET log_id = ? WHERE id = ?",
        params![log_id, record_id],
    )?;
    Ok(())
}

pub(crate) fn move_all_records(conn: &Connection, from: i64, to: i64) -> Result<usize, TrackError> {
    Ok(conn.execute(
        "UPDATE records SET log_id = ? WHERE log_id = ?",
        params![to, from],
    )?)
}

pub(crate) fn delete_record(conn: &Connection, id: i64) -> Result<(), TrackError> {
    conn.execute("DELETE FROM records WHERE id = ?", [id])?;
    Ok(())
}

pub(crate) fn count_records(conn: &Connection, log_id: i64) -> Result<i64, TrackError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM records WHERE log_id = ?",
        [log_id],
        |row| row.get(0),
    )?)
}

// ========== Logs ==========

#[derive(Debug)]
struct LogRow {
    id: i64,
    category_id: Option<i64>,
    task_id: Option<i64>,
    meta: Option<String>,
    stopped: bool,
    name: String,
    description: Option<String>,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category_id: row.get(1)?,
            task_id: row.get(2)?,
            meta: row.get(3)?,
            stopped: row.get(4)?,
            name: row.get(5)?,
            description: row.get(6)?,
        })
    }
}

/// Column values for inserting a log.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogColumns {
    pub category_id: Option<i64>,
    pub task_id: Option<i64>,
    pub meta: Option<Meta>,
    pub stopped: bool,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Log> for LogColumns {
    fn from(log: &Log) -> Self {
        Self {
            category_id: log.category_id,
            task_id: log.task_id,
            meta: log.meta.clone(),
            stopped: log.stopped,
            name: log.name.clone(),
            description: log.description.clone(),
        }
    }
}

pub(crate) fn insert_log(conn: &Connection, columns: &LogColumns) -> Result<i64, TrackError> {
    conn.execute(
        "
        INSERT INTO logs (category_id, task_id, meta, stopped, name, description)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
        params![
            columns.category_id,
            columns.task_id,
            encode_meta(columns.meta.as_ref())?,
            columns.stopped,
            columns.name,
            columns.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Loads a log with its flags and records.
pub(crate) fn load_log(conn: &Connection, id: i64) -> Result<Option<Log>, TrackError> {
    let row = conn
        .query_row(
            "
            SELECT id, category_id, task_id, meta, stopped, name, description
            FROM logs
            WHERE id = ?
            ",
            [id],
            LogRow::from_row,
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(Log {
        id: row.id,
        category_id: row.category_id,
        task_id: row.task_id,
        meta: decode_meta(row.meta, "log", row.id)?,
        stopped: row.stopped,
        name: row.name,
        description: row.description,
        flags: flags_of_log(conn, row.id)?,
        records: records_of_log(conn, row.id)?,
    }))
}

pub(crate) fn require_log(conn: &Connection, id: i64) -> Result<Log, TrackError> {
    load_log(conn, id)?.ok_or_else(|| TrackError::not_found("log", id))
}

pub(crate) fn load_logs(conn: &Connection, ids: &[i64]) -> Result<Vec<Log>, TrackError> {
    ids.iter().map(|id| require_log(conn, *id)).collect()
}

/// Writes the scalar columns of `log` back; flags and records are untouched.
pub(crate) fn update_log(conn: &Connection, log: &Log) -> Result<(), TrackError> {
    conn.execute(
        "
        UPDATE logs
        SET category_id = ?, task_id = ?, meta = ?, stopped = ?, name = ?, description = ?
        WHERE id = ?
        ",
        params![
            log.category_id,
            log.task_id,
            encode_meta(log.meta.as_ref())?,
            log.stopped,
            log.name,
            log.description,
            log.id,
        ],
    )?;
    Ok(())
}

pub(crate) fn set_stopped(conn: &Connection, log_id: i64, stopped: bool) -> Result<(), TrackError> {
    conn.execute(
        "UPDATE logs SET stopped = ? WHERE id = ?",
        params![stopped, log_id],
    )?;
    Ok(())
}

/// Deletes a log; records and flags go with it.
pub(crate) fn delete_log(conn: &Connection, id: i64) -> Result<(), TrackError> {
    conn.execute("DELETE FROM logs WHERE id = ?", [id])?;
    Ok(())
}

// ========== Flags ==========

pub(crate) fn flags_of_log(conn: &Connection, log_id: i64) -> Result<Vec<String>, TrackError> {
    let mut stmt = conn.prepare("SELECT flag FROM log_flags WHERE log_id = ? ORDER BY flag ASC")?;
    let rows = stmt.query_map([log_id], |row| row.get::<_, String>(0))?;
    let mut flags = Vec::new();
    for row in rows {
        flags.push(row?);
    }
    Ok(flags)
}

/// Replaces the flag set of a log.
pub(crate) fn replace_flags(
    conn: &Connection,
    log_id: i64,
    flags: &[String],
) -> Result<(), TrackError> {
    conn.execute("DELETE FROM log_flags WHERE log_id = ?", [log_id])?;
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO log_flags (log_id, flag) VALUES (?, ?)")?;
    for flag in flags {
        stmt.execute(params![log_id, flag])?;
    }
    Ok(())
}
