//! Configuration file support for relayd
//!
//! Loads and validates the relay configuration from a TOML file.
//! Default location: /etc/bridge/relayd.toml

use crate::error::{RelayError, Result};
use bridge_types::{MacAddress, PortId, PortRole};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Learning table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacTableConfig {
    /// Seconds after which a learned entry expires (0 disables aging)
    #[serde(default = "default_aging_time")]
    pub aging_time_secs: u64,
}

/// One bridge port as described in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Stable port identifier
    pub id: PortId,

    /// Interface name, used in logs only
    #[serde(default)]
    pub name: String,

    /// Hardware address of the port
    pub mac: MacAddress,

    /// Loopback ports never take part in flooding or bridge identity
    #[serde(default)]
    pub loopback: bool,

    /// Port can carry broadcast frames
    #[serde(default = "default_broadcast")]
    pub broadcast: bool,

    /// Initial spanning-tree role, required when `stp_aware` is set
    #[serde(default)]
    pub role: Option<PortRole>,
}

/// Complete relayd configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay cooperates with an external STP/RSTP process
    #[serde(default)]
    pub stp_aware: bool,

    /// Relay starts in the operating state
    #[serde(default = "default_start_operational")]
    pub start_operational: bool,

    /// Depth of the daemon event queue
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,

    /// Learning table configuration
    #[serde(default)]
    pub mac_table: MacTableConfig,

    /// Bridge ports in enumeration order
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

fn default_aging_time() -> u64 {
    120
}

fn default_broadcast() -> bool {
    true
}

fn default_start_operational() -> bool {
    true
}

fn default_event_queue_depth() -> usize {
    1024
}

impl Default for MacTableConfig {
    fn default() -> Self {
        Self {
            aging_time_secs: default_aging_time(),
        }
    }
}

impl MacTableConfig {
    /// Aging time as a duration, `None` when aging is disabled.
    pub fn aging_time(&self) -> Option<Duration> {
        match self.aging_time_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stp_aware: false,
            start_operational: default_start_operational(),
            event_queue_depth: default_event_queue_depth(),
            mac_table: MacTableConfig::default(),
            ports: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(RelayError::Configuration(
                "at least one port must be configured".to_string(),
            ));
        }

        if self.event_queue_depth == 0 {
            return Err(RelayError::Configuration(
                "event_queue_depth must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for port in &self.ports {
            if !seen.insert(port.id) {
                return Err(RelayError::Configuration(format!(
                    "duplicate port id {}",
                    port.id
                )));
            }
        }

        Ok(())
    }
}
