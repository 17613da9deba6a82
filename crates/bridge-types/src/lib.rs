//! Common layer-2 types for the bridge relay.
//!
//! This crate provides type-safe representations of the primitives the
//! relay and its collaborators exchange:
//!
//! - [`MacAddress`]: 48-bit Ethernet hardware addresses
//! - [`PortId`]: stable bridge port identifiers
//! - [`PortRole`]: spanning-tree port state as published by the STP process

mod mac;
mod port;

pub use mac::MacAddress;
pub use port::{PortId, PortRole};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid port role: {0}")]
    InvalidPortRole(String),
}
