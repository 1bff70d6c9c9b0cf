use thiserror::Error;

use clinic_auth::AuthError;
use clinic_config::ConfigError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync service could not be reached. Recovered by the bounded retry path.
    #[error("sync service unreachable: {0}")]
    Unreachable(String),

    /// The sync service refused the credential.
    #[error("sync credential rejected: {0}")]
    Rejected(String),

    #[error("sync service not configured: {0}")]
    NotConfigured(#[from] ConfigError),

    #[error("credential unavailable: {0}")]
    Auth(#[from] AuthError),

    #[error("replica error: {0}")]
    Database(#[from] libsql::Error),

    #[error("connection manager has stopped")]
    ManagerStopped,
}

impl SyncError {
    /// Classify a libSQL replication error.
    ///
    /// Transient Turso infrastructure errors and transport failures count as
    /// unreachable; auth statuses from the Hrana endpoint count as rejections.
    #[must_use]
    pub fn from_libsql(e: libsql::Error) -> Self {
        let msg = e.to_string();
        if is_transient_turso_error(&msg) || is_transport_error(&msg) {
            Self::Unreachable(msg)
        } else if is_auth_rejection(&msg) {
            Self::Rejected(msg)
        } else {
            Self::Database(e)
        }
    }

    #[must_use]
    pub const fn is_reachability(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Auth(AuthError::Unreachable(_)))
    }
}

/// Turso cloud nodes being created, deleted, or recycled. These resolve on
/// their own within seconds.
fn is_transient_turso_error(msg: &str) -> bool {
    msg.contains("unable to acquire shared lock") || msg.contains("deletion must be in progress")
}

fn is_transport_error(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("connection refused")
        || msg.contains("error sending request")
        || msg.contains("dns error")
        || msg.contains("timed out")
        || msg.contains("connection reset")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}

fn is_auth_rejection(msg: &str) -> bool {
    msg.contains("401") || msg.contains("403") || msg.contains("Unauthorized")
}
