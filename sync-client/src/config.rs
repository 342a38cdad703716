//! Configuration for the sync client.
//!
//! Loaded from a TOML file or built in code with the `with_*` methods.
//! Every field except `address` has a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Authority address passed to the channel.
    pub address: String,
    /// Time allowed for a publication response (default: 10 s).
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// Reconnect after an unrequested disconnect (default: true).
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// Upper bound of the random reconnect jitter (default: 5 s).
    #[serde(default = "default_max_reconnect_jitter_ms")]
    pub max_reconnect_jitter_ms: u64,
}

fn default_publish_timeout_ms() -> u64 {
    10_000
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_max_reconnect_jitter_ms() -> u64 {
    5_000
}

impl SyncConfig {
    /// Configuration with defaults for `address`.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            publish_timeout_ms: default_publish_timeout_ms(),
            auto_reconnect: default_auto_reconnect(),
            max_reconnect_jitter_ms: default_max_reconnect_jitter_ms(),
        }
    }

    /// Set the publication timeout.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the reconnect jitter bound.
    pub fn with_max_reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.max_reconnect_jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Publication timeout as a `Duration`.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    /// Reconnect jitter bound as a `Duration`.
    pub fn max_reconnect_jitter(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_jitter_ms)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: None,
            source: e,
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: Some(path.to_path_buf()),
            source: e,
        })
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration.
    #[error("failed to parse config{}: {source}", location(.path))]
    ParseError {
        /// Path to the configuration file, if any.
        path: Option<PathBuf>,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// Failed to render configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(toml::ser::Error),
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" file {}", p.display()))
        .unwrap_or_default()
}
