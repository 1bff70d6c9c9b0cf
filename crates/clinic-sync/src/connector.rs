//! Sync connector seam.
//!
//! The replication protocol lives behind this trait. The manager only needs
//! `connect`, `disconnect`, and the reactive [`ConnectionStatus`].

use async_trait::async_trait;
use tokio::sync::watch;

use clinic_core::{ConnectionStatus, Credential};

use crate::error::SyncError;

#[async_trait]
pub trait SyncConnector: Send + Sync {
    /// Open the remote sync connection. Updates the published status itself.
    async fn connect(&self, credential: &Credential) -> Result<(), SyncError>;

    async fn disconnect(&self) -> Result<(), SyncError>;

    /// Verify a live connection. Called on the manager's tick while the status
    /// reports connected; a failure must publish `connected: false`.
    async fn health_check(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Current value via `borrow()`, change notifications via `changed()`.
    fn status(&self) -> watch::Receiver<ConnectionStatus>;
}
