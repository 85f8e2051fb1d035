//! Engine configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Command prefixes, tried longest-first on each message.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// User ids with owner privileges (consulted by stock checks).
    #[serde(default)]
    pub owners: Vec<u64>,

    /// Capacity of the recent-context cache.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Seconds between polls of a module's readiness gate.
    #[serde(default = "default_ready_poll_secs")]
    pub ready_poll_secs: u64,

    /// Default per-command deadline in seconds. Unset means no deadline;
    /// commands may still declare their own.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_cache_size() -> usize {
    1000
}

fn default_ready_poll_secs() -> u64 {
    1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            owners: Vec::new(),
            cache_size: default_cache_size(),
            ready_poll_secs: default_ready_poll_secs(),
            command_timeout_secs: None,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DispatchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_secs(self.ready_poll_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
