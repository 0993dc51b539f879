//! Registry service configuration.
//!
//! Configuration is loaded from environment variables. Every setting has a
//! default, so an empty environment yields a working service.

use crate::actors::{RegistryOptions, DEFAULT_CALL_TIMEOUT, DEFAULT_MAILBOX_CAPACITY};
use crate::supervisor::{RestartPolicy, DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_WINDOW};

use common::config::{ObservabilityConfig, DEFAULT_LOG_LEVEL};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default name of the supervised registry.
pub const DEFAULT_REGISTRY_NAME: &str = "pg";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Registry service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory name of the supervised registry (default: "pg").
    pub registry_name: String,

    /// Registry mailbox capacity (default: 1000, must be > 0).
    pub mailbox_capacity: usize,

    /// Caller-side timeout; `None` when `PG_CALL_TIMEOUT_MS=0`.
    pub call_timeout: Option<Duration>,

    /// Health endpoint bind address (default: "0.0.0.0:8090").
    pub health_bind_address: String,

    /// Restarts allowed within the restart window (default: 3).
    pub max_restarts: u32,

    /// Restart window (default: 5 seconds).
    pub restart_window: Duration,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let registry_name = vars
            .get("PG_REGISTRY_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGISTRY_NAME.to_string());
        if registry_name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PG_REGISTRY_NAME must not be empty".to_string(),
            ));
        }

        let mailbox_capacity =
            parse_or(vars, "PG_MAILBOX_CAPACITY", DEFAULT_MAILBOX_CAPACITY)?;
        if mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "PG_MAILBOX_CAPACITY must be > 0".to_string(),
            ));
        }

        // 0 disables the caller timeout
        let default_timeout_ms = u64::try_from(DEFAULT_CALL_TIMEOUT.as_millis()).unwrap_or(5000);
        let call_timeout_ms: u64 = parse_or(vars, "PG_CALL_TIMEOUT_MS", default_timeout_ms)?;
        let call_timeout = (call_timeout_ms > 0).then(|| Duration::from_millis(call_timeout_ms));

        let health_bind_address = vars
            .get("PG_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let max_restarts = parse_or(vars, "PG_MAX_RESTARTS", DEFAULT_MAX_RESTARTS)?;

        let restart_window = Duration::from_secs(parse_or(
            vars,
            "PG_RESTART_WINDOW_SECONDS",
            DEFAULT_RESTART_WINDOW.as_secs(),
        )?);

        let log_level = vars
            .get("PG_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = parse_or(vars, "PG_LOG_JSON", false)?;

        Ok(Config {
            registry_name,
            mailbox_capacity,
            call_timeout,
            health_bind_address,
            max_restarts,
            restart_window,
            observability: ObservabilityConfig {
                log_level,
                json_logs,
            },
        })
    }

    /// Registry options for this configuration, using the task-based oracle.
    #[must_use]
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            mailbox_capacity: self.mailbox_capacity,
            call_timeout: self.call_timeout,
            ..RegistryOptions::default()
        }
    }

    /// Restart policy for the supervisor.
    #[must_use]
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            max_restarts: self.max_restarts,
            window: self.restart_window,
        }
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.registry_name, "pg");
        assert_eq!(config.mailbox_capacity, 1000);
        assert_eq!(config.call_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.health_bind_address, "0.0.0.0:8090");
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.restart_window, Duration::from_secs(5));
        assert_eq!(config.observability, ObservabilityConfig::default());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let config = Config::from_vars(&vars(&[
            ("PG_REGISTRY_NAME", "chat"),
            ("PG_MAILBOX_CAPACITY", "64"),
            ("PG_CALL_TIMEOUT_MS", "250"),
            ("PG_HEALTH_BIND_ADDRESS", "127.0.0.1:9000"),
            ("PG_MAX_RESTARTS", "10"),
            ("PG_RESTART_WINDOW_SECONDS", "30"),
            ("PG_LOG_LEVEL", "debug"),
            ("PG_LOG_JSON", "true"),
        ]))
        .expect("Config should load successfully");

        assert_eq!(config.registry_name, "chat");
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.call_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.health_bind_address, "127.0.0.1:9000");
        assert_eq!(config.max_restarts, 10);
        assert_eq!(config.restart_window, Duration::from_secs(30));
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_zero_call_timeout_disables_timeout() {
        let config = Config::from_vars(&vars(&[("PG_CALL_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.registry_options().call_timeout, None);
    }

    #[test]
    fn test_zero_mailbox_capacity_rejected() {
        let result = Config::from_vars(&vars(&[("PG_MAILBOX_CAPACITY", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        for key in [
            "PG_MAILBOX_CAPACITY",
            "PG_CALL_TIMEOUT_MS",
            "PG_MAX_RESTARTS",
            "PG_RESTART_WINDOW_SECONDS",
        ] {
            let result = Config::from_vars(&vars(&[(key, "lots")]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref msg)) if msg.contains(key)),
                "{key} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let result = Config::from_vars(&vars(&[("PG_LOG_JSON", "yes")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_empty_registry_name_rejected() {
        let result = Config::from_vars(&vars(&[("PG_REGISTRY_NAME", "")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_registry_options_and_policy() {
        let config = Config::from_vars(&vars(&[
            ("PG_MAILBOX_CAPACITY", "8"),
            ("PG_MAX_RESTARTS", "2"),
            ("PG_RESTART_WINDOW_SECONDS", "1"),
        ]))
        .unwrap();

        let options = config.registry_options();
        assert_eq!(options.mailbox_capacity, 8);
        assert_eq!(options.call_timeout, Some(Duration::from_secs(5)));
        assert!(options.parent_token.is_none());

        assert_eq!(
            config.restart_policy(),
            RestartPolicy {
                max_restarts: 2,
                window: Duration::from_secs(1),
            }
        );
    }
}
