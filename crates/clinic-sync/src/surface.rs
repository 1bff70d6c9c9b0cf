//! Read-only status projection for presentation code.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::SyncError;
use crate::machine::ConnectionState;
use crate::manager::{ConnectionManager, ManagerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncIndicator {
    Synced { last_synced_at: Option<DateTime<Utc>> },
    Connecting,
    /// Network is down; local data only.
    Offline,
    /// Retry bound exhausted. Persistent until the next sign-in.
    WorkingOffline,
    SignedOut,
}

impl SyncIndicator {
    #[must_use]
    pub const fn from_snapshot(snapshot: &ManagerSnapshot) -> Self {
        if !snapshot.authenticated {
            return Self::SignedOut;
        }
        match snapshot.state {
            ConnectionState::Connected => Self::Synced {
                last_synced_at: snapshot.status.last_synced_at,
            },
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::GivenUp => Self::WorkingOffline,
            ConnectionState::Disconnected if snapshot.online && snapshot.pending_attempts > 0 => {
                Self::Connecting
            }
            ConnectionState::Disconnected => Self::Offline,
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Synced {
                last_synced_at: Some(at),
            } => format!("Synced {}", at.format("%Y-%m-%d %H:%M UTC")),
            Self::Synced {
                last_synced_at: None,
            } => "Synced".to_string(),
            Self::Connecting => "Connecting…".to_string(),
            Self::Offline => "Offline".to_string(),
            Self::WorkingOffline => "Working offline".to_string(),
            Self::SignedOut => "Signed out".to_string(),
        }
    }

    /// Whether the UI should show a persistent offline banner.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Offline | Self::WorkingOffline)
    }
}

/// Subscription to [`SyncIndicator`] changes.
#[derive(Clone)]
pub struct StatusSurface {
    rx: watch::Receiver<ManagerSnapshot>,
}

impl StatusSurface {
    #[must_use]
    pub fn new(manager: &ConnectionManager) -> Self {
        Self {
            rx: manager.snapshot(),
        }
    }

    #[must_use]
    pub fn current(&self) -> SyncIndicator {
        SyncIndicator::from_snapshot(&self.rx.borrow())
    }

    /// Wait until the indicator differs from the last one returned.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ManagerStopped` once the manager is gone.
    pub async fn changed(&mut self) -> Result<SyncIndicator, SyncError> {
        let before = SyncIndicator::from_snapshot(&self.rx.borrow_and_update());
        loop {
            self.rx
                .changed()
                .await
                .map_err(|_| SyncError::ManagerStopped)?;
            let now = SyncIndicator::from_snapshot(&self.rx.borrow_and_update());
            if now != before {
                return Ok(now);
            }
        }
    }
}
