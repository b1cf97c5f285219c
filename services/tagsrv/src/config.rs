//! Gateway configuration
//!
//! One YAML file describes the slave connections, the tag table location
//! and the polling parameters. Tags themselves live in the CSV tag table
//! (see [`crate::registry`]).

use crate::error::{Result, TagSrvError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Path to the CSV tag table
    #[serde(default = "default_tag_table")]
    pub tag_table: PathBuf,

    /// Polling parameters
    #[serde(default)]
    pub poll: PollConfig,

    /// Slave connection definitions
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
}

/// Polling loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Base scheduler tick (milliseconds); scan rates are multiples of this
    #[serde(default = "default_base_tick_ms")]
    pub base_tick_ms: u64,

    /// Bound on Scanner::stop() waiting for the loop to exit (milliseconds)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

/// One Modbus TCP slave endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveConfig {
    /// Unique name tags refer to
    pub name: String,
    /// Host name or IP address
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sub-device identifier multiplexed over the connection
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Connect and I/O timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tag_table() -> PathBuf {
    PathBuf::from("tags.csv")
}

fn default_base_tick_ms() -> u64 {
    1000
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    3000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_tick_ms: default_base_tick_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tag_table: default_tag_table(),
            poll: PollConfig::default(),
            slaves: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TagSrvError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: GatewayConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate slave names and empty endpoints.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for slave in &self.slaves {
            if slave.name.trim().is_empty() {
                return Err(TagSrvError::validation("slave name must not be empty"));
            }
            if slave.host.trim().is_empty() {
                return Err(TagSrvError::validation(format!(
                    "slave {} has an empty host",
                    slave.name
                )));
            }
            if !seen.insert(slave.name.as_str()) {
                return Err(TagSrvError::validation(format!(
                    "duplicate slave name: {}",
                    slave.name
                )));
            }
        }
        if self.poll.base_tick_ms == 0 {
            return Err(TagSrvError::validation("poll.base_tick_ms must be positive"));
        }
        Ok(())
    }

    pub fn slave(&self, name: &str) -> Option<&SlaveConfig> {
        self.slaves.iter().find(|s| s.name == name)
    }
}

impl SlaveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
