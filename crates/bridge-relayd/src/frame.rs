//! Parsed Ethernet frame as seen by the relay.
//!
//! Only the header fields the forwarding decision needs are decoded.
//! Preamble, padding and FCS belong to the framing layer and never reach
//! this crate.

use crate::error::{RelayError, Result};
use bridge_types::MacAddress;

/// Length of the Ethernet II / 802.3 header (dest, src, type-or-length).
pub const ETHER_HEADER_LEN: usize = 14;

/// Largest value of the type/length field that is still a length.
pub const MAX_LLC_LENGTH: u16 = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dest: MacAddress,
    pub src: MacAddress,
    /// EtherType, or payload length for 802.3/LLC frames.
    pub ether_type: u16,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn new(src: MacAddress, dest: MacAddress, ether_type: u16, payload: Vec<u8>) -> Self {
        Self {
            dest,
            src,
            ether_type,
            payload,
        }
    }

    /// Builds the 802.3 wrapper used for spanning-tree control frames.
    pub fn llc(src: MacAddress, dest: MacAddress, payload: Vec<u8>) -> Self {
        let len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
        Self::new(src, dest, len, payload)
    }

    /// Decodes the header from raw bytes starting at the destination address.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ETHER_HEADER_LEN {
            return Err(RelayError::MalformedFrame { len: bytes.len() });
        }

        let dest = MacAddress::from_slice(&bytes[0..6])
            .ok_or(RelayError::MalformedFrame { len: bytes.len() })?;
        let src = MacAddress::from_slice(&bytes[6..12])
            .ok_or(RelayError::MalformedFrame { len: bytes.len() })?;
        let ether_type = u16::from_be_bytes([bytes[12], bytes[13]]);

        Ok(Self {
            dest,
            src,
            ether_type,
            payload: bytes[ETHER_HEADER_LEN..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ETHER_HEADER_LEN + self.payload.len());
        out.extend_from_slice(self.dest.as_bytes());
        out.extend_from_slice(self.src.as_bytes());
        out.extend_from_slice(&self.ether_type.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Returns true if the type/length field holds a length (802.3 framing).
    pub fn is_llc(&self) -> bool {
        self.ether_type <= MAX_LLC_LENGTH
    }

    /// Strips the Ethernet wrapper, returning the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
