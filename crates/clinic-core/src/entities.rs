//! Entities persisted in the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user profile row, created lazily on first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
