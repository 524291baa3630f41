//! # Configuration
//!
//! Plain serde structs with defaults. Every field may be omitted:
//!
//! ```rust
//! use pathfetch::config::ServerConfig;
//!
//! let config = ServerConfig::from_json_str(r#"{ "batch_delay_ms": 5 }"#).unwrap();
//! assert_eq!(config.batch_delay_ms, 5);
//! assert!(config.validate_results);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings of a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// How long a batch stays open. `0` flushes after a single scheduler yield.
    pub batch_delay_ms: u64,
    /// Check every handler result against its resource shape and log problems.
    pub validate_results: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: 0,
            validate_results: true,
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Settings of a [`Client`](crate::Client).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Run callbacks once against placeholders instead of fetching.
    pub mocking: bool,
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
