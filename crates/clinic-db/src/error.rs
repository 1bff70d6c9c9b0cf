//! Database error types for clinic-db.

use thiserror::Error;

/// Errors from local store operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Malformed SQL (syntax error, unknown table or column) or unparseable row data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other constraint (NOT NULL, CHECK, FOREIGN KEY) rejected the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error that is not a SQL or constraint problem.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Classify a libSQL error into the typed variants callers branch on.
    ///
    /// libSQL surfaces SQLite failures as messages, so classification matches
    /// on the SQLite error text. Unrecognized errors stay `LibSql` and are
    /// treated as fatal by callers.
    #[must_use]
    pub fn classify(e: libsql::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed") {
            Self::UniqueViolation(msg)
        } else if msg.contains("constraint failed") {
            Self::Constraint(msg)
        } else if is_malformed_sql(&msg) {
            Self::Query(msg)
        } else {
            Self::LibSql(e)
        }
    }

    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

fn is_malformed_sql(msg: &str) -> bool {
    msg.contains("syntax error")
        || msg.contains("no such table")
        || msg.contains("no such column")
        || msg.contains("incomplete input")
}
