//! Sync-service (libSQL embedded replica) configuration.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default background sync interval in seconds.
const fn default_sync_interval_secs() -> u64 {
    60
}

/// Default read-your-writes setting.
const fn default_read_your_writes() -> bool {
    true
}

fn default_replica_path() -> String {
    String::from("clinic-replica.db")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Sync service URL (e.g. `libsql://clinic-org.turso.io`).
    #[serde(default)]
    pub url: String,

    /// Local file backing the embedded replica.
    #[serde(default = "default_replica_path")]
    pub replica_path: String,

    /// Background sync interval for the replica, in seconds. `0` disables it.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Whether writes through the replica are visible locally before sync.
    #[serde(default = "default_read_your_writes")]
    pub read_your_writes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            replica_path: default_replica_path(),
            sync_interval_secs: default_sync_interval_secs(),
            read_your_writes: default_read_your_writes(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when the sync URL is empty.
    pub fn require(&self) -> Result<&Self, ConfigError> {
        if self.is_configured() {
            Ok(self)
        } else {
            Err(ConfigError::not_configured("sync", &["sync.url"]))
        }
    }
}
