//! Storage layer and log lifecycle engine for metasking.
//!
//! Persists tasks, categories, logs, records and flags with `rusqlite`, and
//! implements every operation that moves logs between running, paused and
//! stopped on top of it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A [`Tracker`] can be moved between threads but needs external synchronization
//! to be shared. Separate processes may open the same file: every mutating
//! operation runs in an `IMMEDIATE` transaction, so writers are serialized by
//! SQLite itself.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). Every value has the same width, so
//! lexicographic ordering matches chronological ordering, which the `MAX`/`MIN`
//! aggregates and the `start_at <= end_at` check rely on.
//!
//! ## Single Open Record
//!
//! The partial unique index `idx_records_single_open` admits at most one row
//! with `end_at IS NULL`. The engine never relies on it for control flow, but
//! it turns any lost race between two writers into a constraint error instead
//! of a second open record.
//!
//! ## Meta Storage
//!
//! `meta` columns hold a JSON object serialized as TEXT, or NULL.

mod editor;
mod error;
mod lifecycle;
mod locator;
mod query;
mod store;
mod tracker;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub use error::{ErrorKind, TrackError};
pub use lifecycle::{CreateMissing, StopOutcome};
pub use tracker::{LogTarget, Tracker, TrackerOptions};

/// Default time a writer waits for a competing transaction to finish.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, TrackError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, TrackError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Sets how long a writer waits on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), TrackError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), TrackError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER,
                task_id INTEGER,
                meta TEXT,
                stopped INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL DEFAULT '',
                description TEXT,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_logs_category ON logs(category_id);
            CREATE INDEX IF NOT EXISTS idx_logs_task ON logs(task_id);
            CREATE INDEX IF NOT EXISTS idx_logs_stopped ON logs(stopped);

            -- start_at/end_at: ISO 8601 with milliseconds (e.g., '2024-01-15T10:30:00.000Z')
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                log_id INTEGER NOT NULL,
                meta TEXT,
                start_at TEXT NOT NULL,
                end_at TEXT,
                CHECK (end_at IS NULL OR start_at <= end_at),
                FOREIGN KEY (log_id) REFERENCES logs(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_records_log ON records(log_id);
            CREATE INDEX IF NOT EXISTS idx_records_start ON records(start_at);
            CREATE INDEX IF NOT EXISTS idx_records_end ON records(end_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_records_single_open
                ON records((end_at IS NULL)) WHERE end_at IS NULL;

            CREATE TABLE IF NOT EXISTS log_flags (
                log_id INTEGER NOT NULL,
                flag TEXT NOT NULL,
                PRIMARY KEY (log_id, flag),
                FOREIGN KEY (log_id) REFERENCES logs(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_log_flags_flag ON log_flags(flag);
            ",
        )?;
        Ok(())
    }

    /// Starts a write transaction holding the database lock until it ends.
    fn write_transaction(&mut self) -> Result<Transaction<'_>, TrackError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    const fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(
    timestamp: &str,
    entity: &'static str,
    id: i64,
) -> Result<DateTime<Utc>, TrackError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| TrackError::Corrupt {
            entity,
            id,
            what: "timestamp",
            message: format!("{timestamp}: {err}"),
        })
}
