//! relayd - transparent Ethernet bridge relay
//!
//! Decides, for every frame arriving on a bridge port, whether to learn its
//! source address, forward it out one port, flood it, hand it to the
//! spanning-tree process, or drop it.
//!
//! # Architecture
//!
//! ```text
//!             [STP/RSTP process]
//!               ^            |
//!   BpduIndication      ControlRequest
//!               |            v
//! [network] -> [Relay] -> [FrameSink] -> [network]
//!               |   ^
//!      MacAddressTable  PortTable (roles written by STP)
//! ```
//!
//! - [`Relay`]: forwarding decision, control-plane bridging, lifecycle
//! - [`RelayDaemon`]: single-consumer event loop around a shared relay
//! - [`InterfaceTable`] / [`MacTable`]: in-memory collaborators
//!
//! The spanning-tree computation itself lives outside this crate; the relay
//! only reads port roles and exchanges BPDUs with it.

mod config;
mod control;
mod daemon;
mod error;
mod frame;
mod lifecycle;
mod mac_table;
mod ports;
mod relay;
mod stats;

pub use config::{MacTableConfig, PortConfig, RelayConfig};
pub use control::{
    BpduIndication, ChannelControlPlane, ChannelSink, ControlPlane, ControlRequest, FrameSink,
};
pub use daemon::{RelayDaemon, RelayEvent, RelayHandle};
pub use error::{RelayError, Result};
pub use frame::{EthernetFrame, ETHER_HEADER_LEN};
pub use lifecycle::{
    CrashStage, LifecycleAction, LifecycleOperation, OperationalState, ShutdownStage, StartStage,
};
pub use mac_table::{MacAddressTable, MacTable};
pub use ports::{
    forwarding_eligible, learning_eligible, InterfaceTable, PortInfo, PortSnapshot, PortTable,
};
pub use relay::{DropReason, ForwardingDecision, Relay};
pub use stats::{RelayStats, RelayStatsSnapshot};

pub use bridge_types::{MacAddress, PortId, PortRole};
