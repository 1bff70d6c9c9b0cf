//! Connection status published by the sync connector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the sync connector's connection state.
///
/// Mutated only by the connector. Everything else observes it read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connecting: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    #[must_use]
    pub const fn disconnected() -> Self {
        Self {
            connected: false,
            connecting: false,
            last_synced_at: None,
        }
    }

    /// Neither connected nor in the middle of connecting.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        !self.connected && !self.connecting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert!(ConnectionStatus::default().is_idle());
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::disconnected());
    }

    #[test]
    fn connecting_is_not_idle() {
        let status = ConnectionStatus {
            connecting: true,
            ..ConnectionStatus::default()
        };
        assert!(!status.is_idle());
    }
}
