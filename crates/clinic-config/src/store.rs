//! Local store configuration.

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    String::from("clinic.db")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// On-device database file. `":memory:"` is accepted for tests.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}
