//! Unified application error type.
//! All modules (db, manager, cli) return AppError to keep error handling
//! consistent across the crate.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Storage
    // ---------------------------
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    // ---------------------------
    // Request rejection
    // ---------------------------
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("an entry already exists for {application} on {date}")]
    DuplicateEntry { application: String, date: String },

    #[error("entry {0} not found")]
    NotFound(i64),

    #[error("unknown application: {0}")]
    UnknownApplication(String),

    // Group mutation against a key whose main row is gone. The grouping
    // engine tolerates this on reads; writes reject it.
    #[error("no main row for grouping key {0}")]
    MissingMain(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("internal error: {0}")]
    Other(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Map a constraint violation raised by the partial unique index on
    /// `(date, application_name) WHERE row_kind = 'main'` to DuplicateEntry;
    /// everything else stays a storage error.
    pub fn from_insert(e: rusqlite::Error, application: &str, date: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref err, _) = e
            && err.code == rusqlite::ErrorCode::ConstraintViolation
        {
            return AppError::DuplicateEntry {
                application: application.to_string(),
                date: date.to_string(),
            };
        }
        AppError::Storage(e)
    }
}
