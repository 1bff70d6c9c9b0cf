//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A required configuration section is missing values.
    #[error("Configuration section '{section}' is not configured (missing: {})", .missing.join(", "))]
    NotConfigured {
        section: String,
        missing: Vec<String>,
    },

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn not_configured(section: &str, missing: &[&str]) -> Self {
        Self::NotConfigured {
            section: section.to_string(),
            missing: missing.iter().map(ToString::to_string).collect(),
        }
    }
}
