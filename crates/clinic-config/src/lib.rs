//! # clinic-config
//!
//! Layered configuration loading for the clinic sync subsystem using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`CLINIC_*` prefix, `__` as separator)
//! 2. Project-level `.clinic/config.toml`
//! 3. User-level `~/.config/clinic/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `CLINIC_IDENTITY__URL` -> `identity.url`, `CLINIC_SYNC__URL` -> `sync.url`, etc.
//! The `__` (double underscore) separates nested config sections.
//!
//! # Usage
//!
//! ```no_run
//! use clinic_config::ClinicConfig;
//!
//! let config = ClinicConfig::load_with_dotenv().expect("config");
//!
//! // Identity URL + key and sync URL are required for remote features.
//! config.require_remote().expect("remote endpoints configured");
//! ```

mod error;
mod identity;
mod retry;
mod store;
mod sync;

pub use error::ConfigError;
pub use identity::IdentityConfig;
pub use retry::RetryConfig;
pub use store::StoreConfig;
pub use sync::SyncConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClinicConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ClinicConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or the retry section is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.retry.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer extra providers.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".clinic/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("CLINIC_").split("__"))
    }

    /// Check the three values every remote feature needs.
    ///
    /// Misconfiguration is reported here, before any network call, so it is
    /// never mistaken for a reachability problem.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` listing every empty required field.
    pub fn require_remote(&self) -> Result<(), ConfigError> {
        let mut missing = self.identity.missing();
        if !self.sync.is_configured() {
            missing.push("sync.url");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::not_configured("remote", &missing))
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clinic").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) looking for a `.env`
    /// file, then falls back to the current directory.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_is_not_remote_ready() {
        let config = ClinicConfig::default();
        assert!(!config.identity.is_configured());
        assert!(!config.sync.is_configured());
        assert_eq!(config.store.path, "clinic.db");
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn require_remote_lists_all_missing_fields() {
        let err = ClinicConfig::default().require_remote().unwrap_err();
        match err {
            ConfigError::NotConfigured { section, missing } => {
                assert_eq!(section, "remote");
                assert_eq!(missing, vec!["identity.url", "identity.api_key", "sync.url"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_remote_passes_when_all_set() {
        let mut config = ClinicConfig::default();
        config.identity.url = "https://auth.example.test".into();
        config.identity.api_key = "anon".into();
        config.sync.url = "libsql://clinic.example.test".into();
        assert!(config.require_remote().is_ok());
    }
}
