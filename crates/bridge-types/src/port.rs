//! Bridge port identifiers and spanning-tree port roles.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a bridge port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub u32);

impl PortId {
    /// Returns the raw identifier.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}

impl From<u32> for PortId {
    fn from(id: u32) -> Self {
        PortId(id)
    }
}

/// Spanning-tree state of a port.
///
/// Owned and mutated by the external STP/RSTP process; the relay only reads
/// the boolean projections below. Deserializes through [`FromStr`], so
/// configuration may spell a role by name in any case or by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[repr(u8)]
pub enum PortRole {
    Disabled = 0,
    Blocking = 1,
    Listening = 2,
    Learning = 3,
    Forwarding = 4,
}

impl PortRole {
    /// Returns true if the port may carry data traffic.
    pub const fn is_forwarding(&self) -> bool {
        matches!(self, PortRole::Forwarding)
    }

    /// Returns true if source addresses seen on the port may be learned.
    pub const fn is_learning(&self) -> bool {
        matches!(self, PortRole::Learning | PortRole::Forwarding)
    }

    /// Returns true if the port takes no part in the spanning tree.
    pub const fn is_disabled(&self) -> bool {
        matches!(self, PortRole::Disabled)
    }

    /// Converts to string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PortRole::Disabled => "disabled",
            PortRole::Blocking => "blocking",
            PortRole::Listening => "listening",
            PortRole::Learning => "learning",
            PortRole::Forwarding => "forwarding",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "disabled" => Ok(PortRole::Disabled),
            "1" | "blocking" => Ok(PortRole::Blocking),
            "2" | "listening" => Ok(PortRole::Listening),
            "3" | "learning" => Ok(PortRole::Learning),
            "4" | "forwarding" => Ok(PortRole::Forwarding),
            _ => Err(ParseError::InvalidPortRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for PortRole {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
