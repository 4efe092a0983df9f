//! Error taxonomy for store and engine operations.

use mt_core::ValidationError;
use thiserror::Error;

/// Errors returned by [`Tracker`](crate::Tracker) operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// No record is currently open.
    #[error("no active log found")]
    NoActiveLog,

    /// The log is already stopped.
    #[error("log {log_id} already stopped")]
    AlreadyStopped { log_id: i64 },

    /// A bulk stop matched no running or paused log.
    #[error("all logs already stopped")]
    NothingToStop,

    /// The log already owns the open record.
    #[error("log {log_id} already running")]
    AlreadyRunning { log_id: i64 },

    /// The log has no open record to close.
    #[error("log {log_id} already paused")]
    AlreadyPaused { log_id: i64 },

    /// Opening a record would leave two records open.
    #[error("record {open_record_id} is already open; close it first")]
    AnotherRecordOpen { open_record_id: i64 },

    /// Stored state contradicted itself and was repaired.
    #[error(
        "log state mismatch: log {log_id} was stopped but still had an open record; \
         it is now set as not stopped to fix the mismatch"
    )]
    StateMismatch { log_id: i64 },

    /// A name that must be unique is taken.
    #[error("{entity} named {name:?} already exists")]
    Duplicate { entity: &'static str, name: String },

    /// Mutations are disabled.
    #[error("read only mode")]
    ReadOnly,

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored data could not be decoded.
    #[error("corrupt {what} in {entity} {id}: {message}")]
    Corrupt {
        entity: &'static str,
        id: i64,
        what: &'static str,
        message: String,
    },

    /// Meta could not be encoded.
    #[error("invalid meta: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`TrackError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyStopped,
    AlreadyRunning,
    AlreadyPaused,
    InvalidTime,
    StateMismatch,
    ReadOnly,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for the kind.
    pub const fn status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ReadOnly => 403,
            Self::StateMismatch | Self::Internal => 500,
            Self::AlreadyStopped
            | Self::AlreadyRunning
            | Self::AlreadyPaused
            | Self::InvalidTime
            | Self::BadRequest => 400,
        }
    }
}

impl TrackError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::NoActiveLog => ErrorKind::NotFound,
            Self::AlreadyStopped { .. } | Self::NothingToStop => ErrorKind::AlreadyStopped,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::AlreadyPaused { .. } => ErrorKind::AlreadyPaused,
            Self::Validation(ValidationError::EndBeforeStart { .. }) => ErrorKind::InvalidTime,
            Self::Validation(_) | Self::AnotherRecordOpen { .. } | Self::Duplicate { .. } => {
                ErrorKind::BadRequest
            }
            Self::StateMismatch { .. } => ErrorKind::StateMismatch,
            Self::ReadOnly => ErrorKind::ReadOnly,
            Self::Sqlite(_) | Self::Corrupt { .. } | Self::Json(_) => ErrorKind::Internal,
        }
    }

    pub const fn status(&self) -> u16 {
        self.kind().status()
    }
}
