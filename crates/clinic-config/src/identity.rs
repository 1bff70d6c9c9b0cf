//! Identity-provider configuration.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_keyring_service() -> String {
    String::from("clinic-sync")
}

const fn default_request_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider (e.g. `https://xyz.supabase.co`).
    #[serde(default)]
    pub url: String,

    /// Public API key sent with every identity request.
    #[serde(default)]
    pub api_key: String,

    /// OS keychain service name for the cached session.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Override for the cached-session file. Empty means `~/.clinic/session.json`.
    #[serde(default)]
    pub session_file: String,

    /// Per-request timeout for identity calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            keyring_service: default_keyring_service(),
            session_file: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl IdentityConfig {
    /// Check if the identity config has the minimum required fields.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.missing().is_empty()
    }

    /// Names of required fields that are empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("identity.url");
        }
        if self.api_key.trim().is_empty() {
            missing.push("identity.api_key");
        }
        missing
    }

    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` listing the empty required fields.
    pub fn require(&self) -> Result<&Self, ConfigError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::not_configured("identity", &missing))
        }
    }

    #[must_use]
    pub fn has_session_file(&self) -> bool {
        !self.session_file.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = IdentityConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.missing(), vec!["identity.url", "identity.api_key"]);
        assert_eq!(config.keyring_service, "clinic-sync");
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn configured_when_url_and_key_set() {
        let config = IdentityConfig {
            url: "https://auth.example.test".into(),
            api_key: "anon-key".into(),
            ..Default::default()
        };
        assert!(config.is_configured());
        assert!(config.require().is_ok());
    }

    #[test]
    fn whitespace_key_counts_as_missing() {
        let config = IdentityConfig {
            url: "https://auth.example.test".into(),
            api_key: "   ".into(),
            ..Default::default()
        };
        let err = config.require().unwrap_err();
        assert!(err.to_string().contains("identity.api_key"));
        assert!(!err.to_string().contains("identity.url"));
    }
}
