//! Integration tests for TOML + environment configuration loading.
//!
//! Uses `figment::Jail` for sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use clinic_config::{ClinicConfig, ConfigError};

#[test]
fn loads_identity_and_sync_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[identity]
url = "https://auth.example.test"
api_key = "anon-key"
keyring_service = "clinic-test"

[sync]
url = "libsql://clinic-dev.example.test"
replica_path = "./replica.db"
sync_interval_secs = 30
read_your_writes = false
"#,
        )?;

        let config: ClinicConfig = Figment::from(Serialized::defaults(ClinicConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.identity.url, "https://auth.example.test");
        assert_eq!(config.identity.api_key, "anon-key");
        assert_eq!(config.identity.keyring_service, "clinic-test");
        assert_eq!(config.sync.url, "libsql://clinic-dev.example.test");
        assert_eq!(config.sync.replica_path, "./replica.db");
        assert_eq!(config.sync.sync_interval_secs, 30);
        assert!(!config.sync.read_your_writes);
        assert!(config.require_remote().is_ok());
        Ok(())
    });
}

#[test]
fn loads_retry_overrides_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r"
[retry]
max_retries = 3
cooldown_ms = 5000
",
        )?;

        let config: ClinicConfig = Figment::from(Serialized::defaults(ClinicConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.cooldown_ms, 5000);
        // Untouched fields keep their defaults.
        assert_eq!(config.retry.attempt_delay_ms, 10_000);
        assert_eq!(config.retry.tick_interval_ms, 15_000);
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[sync]
url = "libsql://from-toml.example.test"
"#,
        )?;
        jail.set_env("CLINIC_SYNC__URL", "libsql://from-env.example.test");

        let config: ClinicConfig = Figment::from(Serialized::defaults(ClinicConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CLINIC_").split("__"))
            .extract()?;

        assert_eq!(config.sync.url, "libsql://from-env.example.test");
        Ok(())
    });
}

#[test]
fn load_picks_up_project_config_and_env() {
    Jail::expect_with(|jail| {
        jail.create_dir(".clinic")?;
        jail.create_file(
            ".clinic/config.toml",
            r#"
[identity]
url = "https://auth.example.test"

[store]
path = "local.db"
"#,
        )?;
        jail.set_env("CLINIC_IDENTITY__API_KEY", "anon-from-env");

        let config = ClinicConfig::load().expect("config loads");
        assert_eq!(config.identity.url, "https://auth.example.test");
        assert_eq!(config.identity.api_key, "anon-from-env");
        assert_eq!(config.store.path, "local.db");

        // sync.url is still missing: misconfiguration, not a network problem.
        let err = config.require_remote().unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured { .. }));
        assert!(err.to_string().contains("sync.url"));
        Ok(())
    });
}

#[test]
fn load_rejects_zero_tick_interval() {
    Jail::expect_with(|jail| {
        jail.set_env("CLINIC_RETRY__TICK_INTERVAL_MS", "0");
        let result = ClinicConfig::load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        Ok(())
    });
}
