//! libSQL embedded-replica connector.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Database};
use tokio::sync::{Mutex, watch};

use clinic_config::SyncConfig;
use clinic_core::{ConnectionStatus, Credential};

use crate::connector::SyncConnector;
use crate::error::SyncError;

/// Keeps an embedded replica of the remote database in sync.
///
/// `connect` builds the replica with the caller's access token and runs an
/// initial `sync()`. After that libSQL syncs every `sync_interval_secs`
/// (when non-zero) and the manager's health check runs [`Self::sync_now`],
/// which drops the replica and publishes disconnected on failure.
/// `disconnect` drops the replica.
pub struct ReplicaConnector {
    config: SyncConfig,
    status: watch::Sender<ConnectionStatus>,
    replica: Mutex<Option<Database>>,
}

impl ReplicaConnector {
    /// # Errors
    ///
    /// Returns `SyncError::NotConfigured` if `sync.url` is missing.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        config.require()?;
        let (status, _rx) = watch::channel(ConnectionStatus::disconnected());
        Ok(Self {
            config,
            status,
            replica: Mutex::new(None),
        })
    }

    fn publish(&self, connected: bool, connecting: bool, synced: bool) {
        self.status.send_modify(|status| {
            status.connected = connected;
            status.connecting = connecting;
            if synced {
                status.last_synced_at = Some(Utc::now());
            }
        });
    }

    async fn open(&self, credential: &Credential) -> Result<Database, SyncError> {
        let mut builder = Builder::new_remote_replica(
            &self.config.replica_path,
            self.config.url.clone(),
            credential.access_token.clone(),
        )
        .read_your_writes(self.config.read_your_writes);
        if self.config.sync_interval_secs > 0 {
            builder = builder.sync_interval(Duration::from_secs(self.config.sync_interval_secs));
        }
        let db = builder.build().await.map_err(SyncError::from_libsql)?;
        db.sync().await.map_err(SyncError::from_libsql)?;
        Ok(db)
    }

    /// Pull remote changes now.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Unreachable` for transport or transient Turso
    /// failures, or when no replica is open. The status is published as
    /// disconnected whenever the sync fails.
    pub async fn sync_now(&self) -> Result<(), SyncError> {
        let guard = self.replica.lock().await;
        let Some(db) = guard.as_ref() else {
            self.publish(false, false, false);
            return Err(SyncError::Unreachable("replica not connected".into()));
        };
        match db.sync().await {
            Ok(_) => {
                self.publish(true, false, true);
                Ok(())
            }
            Err(e) => {
                drop(guard);
                let error = SyncError::from_libsql(e);
                tracing::warn!(%error, "replica sync failed; disconnecting");
                self.replica.lock().await.take();
                self.publish(false, false, false);
                Err(error)
            }
        }
    }
}

#[async_trait]
impl SyncConnector for ReplicaConnector {
    async fn connect(&self, credential: &Credential) -> Result<(), SyncError> {
        let mut replica = self.replica.lock().await;
        if replica.is_some() {
            return Ok(());
        }
        self.publish(false, true, false);
        tracing::debug!(user_id = %credential.user.id, url = %self.config.url, "opening embedded replica");

        match self.open(credential).await {
            Ok(db) => {
                *replica = Some(db);
                self.publish(true, false, true);
                tracing::info!(path = %self.config.replica_path, "embedded replica connected");
                Ok(())
            }
            Err(error) => {
                self.publish(false, false, false);
                tracing::warn!(%error, "embedded replica connect failed");
                Err(error)
            }
        }
    }

    async fn health_check(&self) -> Result<(), SyncError> {
        self.sync_now().await
    }

    async fn disconnect(&self) -> Result<(), SyncError> {
        if self.replica.lock().await.take().is_some() {
            tracing::info!("embedded replica disconnected");
        }
        self.publish(false, false, false);
        Ok(())
    }

    fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}
