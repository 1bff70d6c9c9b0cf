//! Object-safe statement interface over the local store.
//!
//! Everything above the database (the provisioner, tests that simulate
//! concurrent writers) talks to this trait instead of `libsql` directly.

use async_trait::async_trait;
use libsql::{Row, Value};

use crate::error::DatabaseError;

/// One result row, copied out of the statement while it was live.
///
/// `libsql::Row` reads through to the statement it came from, so rows must be
/// materialized before the cursor advances.
#[derive(Debug, Clone)]
pub struct StoredRow {
    values: Vec<Value>,
}

impl StoredRow {
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if a column cannot be read.
    pub fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        let values = (0..row.column_count())
            .map(|idx| row.get_value(idx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Query` if `idx` is out of range.
    pub fn value(&self, idx: usize) -> Result<&Value, DatabaseError> {
        self.values
            .get(idx)
            .ok_or_else(|| DatabaseError::Query(format!("column {idx} out of range")))
    }

    /// Required TEXT column.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Query` if the column is missing or not TEXT.
    pub fn text(&self, idx: usize) -> Result<String, DatabaseError> {
        match self.value(idx)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(DatabaseError::Query(format!(
                "column {idx}: expected TEXT, got {other:?}"
            ))),
        }
    }

    /// Nullable TEXT column.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Query` if the column is missing or neither TEXT nor NULL.
    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, DatabaseError> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(DatabaseError::Query(format!(
                "column {idx}: expected TEXT or NULL, got {other:?}"
            ))),
        }
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::Query` if the column is missing or not INTEGER.
    pub fn integer(&self, idx: usize) -> Result<i64, DatabaseError> {
        match self.value(idx)? {
            Value::Integer(n) => Ok(*n),
            other => Err(DatabaseError::Query(format!(
                "column {idx}: expected INTEGER, got {other:?}"
            ))),
        }
    }
}

#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Execute a parameterized statement, returning the number of rows changed.
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError>;

    /// Run a parameterized query and collect every row. Zero rows is `Ok(vec![])`.
    async fn query(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<StoredRow>, DatabaseError>;

    /// Run a parameterized query and return the first row, if any.
    async fn get_optional(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<StoredRow>, DatabaseError> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// Generate a prefixed random ID, e.g. `"prf-a3f8b2c1"`.
    async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError>;
}
