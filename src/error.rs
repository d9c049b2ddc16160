use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Bad input caught before anything reaches the storage layer.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Task title is required")]
    EmptyTitle,

    #[error("Priority must be between 0 and 4, got {0}")]
    PriorityOutOfRange(i64),

    #[error("Priority must be a number, got '{0}'")]
    PriorityNotANumber(String),

    #[error("Unknown status '{0}', expected pending or completed")]
    UnknownStatus(String),

    #[error("Unknown format '{0}', expected table, json or markdown")]
    UnknownFormat(String),
}

/// Failures of the storage layer. Nothing in here is retried; callers
/// surface the error to the user.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted an id with no row behind it.
    #[error("Task {id} not found")]
    NotFound { id: i64 },

    /// A storage operation was issued before `initialize`.
    #[error("Storage used before it was initialized")]
    NotInitialized,

    #[error("Failed to create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A timestamp the text encoding cannot hold (years 0 through 9999).
    #[error("Timestamp for {column} is out of range: {value}")]
    TimestampOutOfRange {
        column: &'static str,
        value: DateTime<Utc>,
    },

    /// A stored value could not be decoded back into a task.
    #[error("Corrupt value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },

    /// One item of a batch failed; the whole batch was rolled back.
    #[error("Batch aborted at item {index}, nothing was written: {source}")]
    Batch {
        index: usize,
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether the error means the database itself could not be used, as
    /// opposed to a problem with the request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::CreateDir { .. }
            | StoreError::Open { .. }
            | StoreError::Database(_)
            | StoreError::Corrupt { .. } => true,
            StoreError::Batch { source, .. } => source.is_unavailable(),
            StoreError::NotFound { .. }
            | StoreError::NotInitialized
            | StoreError::TimestampOutOfRange { .. } => false,
        }
    }
}
