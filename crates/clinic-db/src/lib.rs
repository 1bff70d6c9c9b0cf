//! # clinic-db
//!
//! libSQL local store for the clinic sync subsystem.
//!
//! The local store is the single source of truth for reads. It answers
//! queries from whatever is materialized on the device, whether or not the
//! sync connector is currently connected. Writes are durable locally; the
//! external sync protocol propagates them.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod store;

use async_trait::async_trait;
use error::DatabaseError;
use clinic_config::StoreConfig;
use libsql::{Builder, Value};

pub use repos::profile::{ProfileDefaults, ProfileProvisioner};
pub use store::{SqlStore, StoredRow};

/// Handle to the embedded on-device database.
///
/// Opened once per process. The connection is shared by every caller;
/// libSQL serializes its own transactions.
pub struct LocalStore {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl LocalStore {
    /// Open a local database at the given path (`":memory:"` for tests).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        tracing::debug!(path, "local store opened");
        Ok(store)
    }

    /// Open the database file named by the `[store]` config section.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &StoreConfig) -> Result<Self, DatabaseError> {
        Self::open_local(&config.path).await
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}

#[async_trait]
impl SqlStore for LocalStore {
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        self.conn
            .execute(sql, params)
            .await
            .map_err(DatabaseError::classify)
    }

    async fn query(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<StoredRow>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(DatabaseError::classify)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DatabaseError::classify)? {
            out.push(StoredRow::from_row(&row)?);
        }
        Ok(out)
    }

    async fn get_optional(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Option<StoredRow>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(DatabaseError::classify)?;
        rows.next()
            .await
            .map_err(DatabaseError::classify)?
            .map(|row| StoredRow::from_row(&row))
            .transpose()
    }

    /// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
    async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let row = self
            .get_optional(
                "SELECT ?1 || '-' || lower(hex(randomblob(4)))",
                vec![Value::from(prefix.to_string())],
            )
            .await?
            .ok_or(DatabaseError::NoResult)?;
        row.text(0)
    }
}
