//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Identifier of a table within a [`TableManager`](super::TableManager).
pub type TableId = u64;

/// Longest a single turn may be configured to last.
pub const MAX_TURN_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Longest pause allowed between a settled round and the next deal.
pub const MAX_RESULT_DELAY_MS: u64 = 60 * 1000;

/// Longest a dropped connection may keep its seat.
pub const MAX_DISCONNECT_GRACE_MS: u64 = 60 * 1000;

pub const MAX_TABLE_NAME_LENGTH: usize = 64;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// How long the current player has before a move is made for them.
    pub turn_timeout_ms: u64,

    /// Pause after a round won by emptying a hand.
    pub round_result_delay_ms: u64,

    /// Pause after a locked round, longer so players can look at the
    /// revealed hands.
    pub locked_result_delay_ms: u64,

    /// How long a dropped connection keeps its seat, waiting for a
    /// reconnect. Zero unseats immediately.
    pub disconnect_grace_ms: u64,

    /// Start the match as soon as the fourth player sits down.
    pub auto_start: bool,

    /// Fixed RNG seed, for reproducible tables.
    pub seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Default Table".to_string(),
            turn_timeout_ms: 30_000,
            round_result_delay_ms: 3_000,
            locked_result_delay_ms: 5_000,
            disconnect_grace_ms: 500,
            auto_start: true,
            seed: None,
        }
    }
}

impl TableConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `TABLE_NAME` | `name` |
    /// | `TURN_TIMEOUT_MS` | `turn_timeout_ms` |
    /// | `ROUND_RESULT_DELAY_MS` | `round_result_delay_ms` |
    /// | `LOCKED_RESULT_DELAY_MS` | `locked_result_delay_ms` |
    /// | `DISCONNECT_GRACE_MS` | `disconnect_grace_ms` |
    /// | `TABLE_AUTO_START` | `auto_start` |
    /// | `TABLE_SEED` | `seed` |
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration doesn't validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            name: std::env::var("TABLE_NAME").unwrap_or(defaults.name),
            turn_timeout_ms: parse_env_or("TURN_TIMEOUT_MS", defaults.turn_timeout_ms),
            round_result_delay_ms: parse_env_or(
                "ROUND_RESULT_DELAY_MS",
                defaults.round_result_delay_ms,
            ),
            locked_result_delay_ms: parse_env_or(
                "LOCKED_RESULT_DELAY_MS",
                defaults.locked_result_delay_ms,
            ),
            disconnect_grace_ms: parse_env_or("DISCONNECT_GRACE_MS", defaults.disconnect_grace_ms),
            auto_start: parse_env_or("TABLE_AUTO_START", defaults.auto_start),
            seed: std::env::var("TABLE_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 {
            return Err(ConfigError::invalid("TABLE_NAME", "must not be empty"));
        }
        if name_len > MAX_TABLE_NAME_LENGTH {
            return Err(ConfigError::invalid(
                "TABLE_NAME",
                format!("must be at most {MAX_TABLE_NAME_LENGTH} characters"),
            ));
        }

        if self.turn_timeout_ms == 0 || self.turn_timeout_ms > MAX_TURN_TIMEOUT_MS {
            return Err(ConfigError::invalid(
                "TURN_TIMEOUT_MS",
                format!("must be between 1 and {MAX_TURN_TIMEOUT_MS}"),
            ));
        }

        if self.round_result_delay_ms > MAX_RESULT_DELAY_MS {
            return Err(ConfigError::invalid(
                "ROUND_RESULT_DELAY_MS",
                format!("must be at most {MAX_RESULT_DELAY_MS}"),
            ));
        }

        if self.locked_result_delay_ms > MAX_RESULT_DELAY_MS {
            return Err(ConfigError::invalid(
                "LOCKED_RESULT_DELAY_MS",
                format!("must be at most {MAX_RESULT_DELAY_MS}"),
            ));
        }

        if self.disconnect_grace_ms > MAX_DISCONNECT_GRACE_MS {
            return Err(ConfigError::invalid(
                "DISCONNECT_GRACE_MS",
                format!("must be at most {MAX_DISCONNECT_GRACE_MS}"),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    #[must_use]
    pub fn round_result_delay(&self) -> Duration {
        Duration::from_millis(self.round_result_delay_ms)
    }

    #[must_use]
    pub fn locked_result_delay(&self) -> Duration {
        Duration::from_millis(self.locked_result_delay_ms)
    }

    #[must_use]
    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
