//! Error types for the bridge relay.
//!
//! Only conditions that must abort the bridge instance (or that stop the
//! daemon from coming up) are errors. Frames dropped by the forwarding
//! decision are reported through [`crate::DropReason`] and the statistics
//! counters instead.

use bridge_types::PortId;
use thiserror::Error;

/// Bridge relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    /// Start requested but every port is a loopback
    #[error("No non-loopback interface found")]
    NoNonLoopbackPort,

    /// Spanning-tree awareness is enabled but the port carries no role
    #[error("Spanning-tree port data not found for {0}")]
    MissingPortRole(PortId),

    /// Port id unknown to the port table
    #[error("Port {0} doesn't exist")]
    UnknownPort(PortId),

    /// Raw frame too short to carry an Ethernet header
    #[error("Malformed frame: {len} bytes is shorter than an Ethernet header")]
    MalformedFrame { len: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event channel closed while the relay was still running
    #[error("Relay event channel closed")]
    ChannelClosed,
}

impl RelayError {
    /// Returns true if this error must stop the whole bridge instance.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::NoNonLoopbackPort
                | RelayError::MissingPortRole(_)
                | RelayError::UnknownPort(_)
        )
    }
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
