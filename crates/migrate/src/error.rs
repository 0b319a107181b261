//! Error types for the migration engine
//!
//! Database failures are carried as the driver's own `sqlx::Error` so callers
//! see exactly what the server reported. Advisory parse problems are not
//! errors; see [`crate::sql_parser::ParseWarning`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// The script contains neither an Up nor a Down directive
    #[error("no Up/Down annotations found in {path}, so no statements were executed")]
    NoDirectives { path: String },

    /// A script line exceeds the scanner buffer
    #[error("line {line} exceeds the maximum line length of {limit} bytes")]
    LineTooLong { line: usize, limit: usize },

    #[error("line {line} is not valid UTF-8")]
    InvalidUtf8 { line: usize },

    #[error("failed to read migration {path}: {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Statement, bookkeeping, commit or connection failure, as reported by the driver
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{0:?}: unknown dialect")]
    UnknownDialect(String),

    #[error("unsupported dbstring: {0:?}")]
    UnsupportedDbString(String),

    #[error("no migration found for version {0}")]
    MigrationNotFound(i64),

    #[error("invalid migration file name: {0}")]
    InvalidMigrationName(String),

    #[error("duplicate migration version {0}")]
    DuplicateVersion(i64),

    /// A row returned by the version store could not be decoded
    #[error("unexpected value in column '{column}': {message}")]
    RowDecode { column: String, message: String },
}

impl MigrateError {
    /// Create a row decoding error
    pub fn row_decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RowDecode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// The underlying driver error, if this failure came from the database
    pub fn as_database_error(&self) -> Option<&sqlx::Error> {
        match self {
            MigrateError::Database(err) => Some(err),
            _ => None,
        }
    }
}
