//! Reconnection policy configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_max_retries() -> u32 {
    2
}

const fn default_cooldown_ms() -> u64 {
    60_000
}

const fn default_attempt_delay_ms() -> u64 {
    10_000
}

const fn default_tick_interval_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum automatic connection attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum time between two scheduled attempts, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Delay between scheduling an attempt and running it, in milliseconds.
    #[serde(default = "default_attempt_delay_ms")]
    pub attempt_delay_ms: u64,

    /// Period of the re-evaluation tick, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            cooldown_ms: default_cooldown_ms(),
            attempt_delay_ms: default_attempt_delay_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    #[must_use]
    pub const fn attempt_delay(&self) -> Duration {
        Duration::from_millis(self.attempt_delay_ms)
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero tick interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.tick_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
