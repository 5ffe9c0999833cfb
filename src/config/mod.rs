// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Broker client configuration
//!
//! Values come from built-in defaults, a TOML file (`[broker]` table, with an
//! optional `[broker.handshake]` sub-table) or environment variables:
//!
//! ```bash
//! export BROKER_BASE_URL=https://broker.example.com/api/v1
//! export BROKER_API_KEY=...
//! export BROKER_REQUEST_TIMEOUT_SECS=30
//! export BROKER_HANDSHAKE_POLL_MS=1000
//! export BROKER_HANDSHAKE_TIMEOUT_MS=30000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Handshake polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Delay between status polls
    pub poll_interval_ms: u64,
    /// Give up waiting for the peer after this long
    pub timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl HandshakeConfig {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval_ms: millis_ceil(poll_interval),
            timeout_ms: millis_ceil(timeout),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Apply per-call overrides
    ///
    /// Durations are stored in whole milliseconds, rounded up.
    pub fn with_overrides(mut self, poll_interval: Option<Duration>, timeout: Option<Duration>) -> Self {
        if let Some(interval) = poll_interval {
            self.poll_interval_ms = millis_ceil(interval);
        }
        if let Some(timeout) = timeout {
            self.timeout_ms = millis_ceil(timeout);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "handshake.poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "handshake.timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Rounds up so a non-zero duration never collapses to 0 ms
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Connection settings for the registry broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub handshake: HandshakeConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load configuration from a TOML file
    ///
    /// Reads the `[broker]` table when present, otherwise the top level.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let toml_value: toml::Value =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let table = toml_value.get("broker").cloned().unwrap_or(toml_value);
        let config: BrokerConfig = table
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables (and a `.env` file, if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(val) = std::env::var("BROKER_BASE_URL") {
            config.base_url = val;
        }

        if let Ok(val) = std::env::var("BROKER_API_KEY") {
            if !val.trim().is_empty() {
                config.api_key = Some(val);
            }
        }

        if let Ok(val) = std::env::var("BROKER_REQUEST_TIMEOUT_SECS") {
            if let Ok(num) = val.parse() {
                config.request_timeout_secs = num;
            }
        }

        if let Ok(val) = std::env::var("BROKER_HANDSHAKE_POLL_MS") {
            if let Ok(num) = val.parse() {
                config.handshake.poll_interval_ms = num;
            }
        }

        if let Ok(val) = std::env::var("BROKER_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(num) = val.parse() {
                config.handshake.timeout_ms = num;
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            field: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "base_url".to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.handshake.validate()
    }
}
