use rusqlite::ffi;
use thiserror::Error;

/// Errors raised by the stores, the selection loop and the external collaborators
#[derive(Error, Debug)]
pub enum DrillError {
    /// A key that must be unique already exists (word, or category + sequence)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Enrichment, question generation or rendering failed or returned something unusable
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DrillError>;

impl DrillError {
    /// Unique/primary key violations become `Conflict`, other constraint failures
    /// (CHECK, NOT NULL) become `Validation`, everything else passes through
    pub(crate) fn from_insert(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                        DrillError::Conflict(what.into())
                    }
                    _ => DrillError::Validation(
                        msg.unwrap_or_else(|| "constraint violated".to_string()),
                    ),
                }
            }
            other => DrillError::Storage(other),
        }
    }
}
