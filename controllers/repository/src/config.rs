//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;

/// Runtime configuration for the Repository Controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Poll interval for repositories without `pullStrategy.intervalSeconds`
    pub default_poll_interval: Duration,
    /// Upper bound for a single registry HTTP request
    pub registry_request_timeout: Duration,
    /// First retry delay after a watcher fails to start
    pub retry_min: Duration,
    /// Retry delay cap
    pub retry_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            default_poll_interval: Duration::from_secs(120),
            registry_request_timeout: Duration::from_secs(30),
            retry_min: Duration::from_secs(5),
            retry_max: Duration::from_secs(300),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let seconds = |key: &str, default: Duration| -> Result<Duration, ControllerError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) => Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key))),
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                    Err(e) => Err(ControllerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
                },
            }
        };

        let config = Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            default_poll_interval: seconds("DEFAULT_POLL_INTERVAL_SECS", defaults.default_poll_interval)?,
            registry_request_timeout: seconds("REGISTRY_REQUEST_TIMEOUT_SECS", defaults.registry_request_timeout)?,
            retry_min: seconds("RETRY_MIN_SECS", defaults.retry_min)?,
            retry_max: seconds("RETRY_MAX_SECS", defaults.retry_max)?,
        };

        if config.retry_min > config.retry_max {
            return Err(ControllerError::InvalidConfig(
                "RETRY_MIN_SECS must not exceed RETRY_MAX_SECS".to_string(),
            ));
        }
        Ok(config)
    }
}
