//! Typed configuration from environment variables or TOML.
//!
//! Loads once at startup, fails fast on malformed values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            queue: QueueConfig::from_env()?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Settings for a single [`crate::engine::BoundedTaskQueue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of tasks executing at once.
    pub max_concurrent: usize,
    /// Timeout applied by `submit` when the caller gives none. `None` or 0 disables it.
    pub default_timeout_ms: Option<u64>,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            default_timeout_ms: None,
            event_buffer: 256,
        }
    }
}

impl QueueConfig {
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Self::default()
        }
    }

    /// Read `TASKQ_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_concurrent: optional_var("TASKQ_MAX_CONCURRENT")?
                .unwrap_or(defaults.max_concurrent),
            default_timeout_ms: optional_var("TASKQ_DEFAULT_TIMEOUT_MS")?,
            event_buffer: optional_var("TASKQ_EVENT_BUFFER")?.unwrap_or(defaults.event_buffer),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::Config(format!("invalid queue config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::InvalidCapacity(self.max_concurrent));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config("event_buffer must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
