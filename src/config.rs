use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Timeouts and retry bounds of the store and the transfer coordinator.
///
/// Every field is optional in the JSON form; missing ones fall back to
/// [`BankConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BankConfig {
    /// Upper bound on waiting for all account leases of one unit of work.
    pub lock_timeout_ms: u64,
    /// Upper bound on waiting for the commit gate (commits and reads).
    pub commit_timeout_ms: u64,
    /// How many times a unit of work that lost a lease race is retried.
    pub max_conflict_retries: u32,
    /// Base pause between conflict retries, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2_000,
            commit_timeout_ms: 1_000,
            max_conflict_retries: 3,
            retry_backoff_ms: 10,
        }
    }
}

impl BankConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BankConfig::from_json(r#"{ "lock_timeout_ms": 50 }"#).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(50));
        assert_eq!(config.commit_timeout_ms, 1_000);
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = BankConfig::from_json(r#"{ "lock_timeout": 50 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
