//! Collaborators at the relay's edges: the spanning-tree control process
//! and the per-port transmission path.

use crate::frame::EthernetFrame;
use bridge_types::{MacAddress, PortId};
use tokio::sync::mpsc;
use tracing::warn;

/// Control payload handed to the spanning-tree process, with the address
/// metadata of the Ethernet wrapper it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpduIndication {
    pub payload: Vec<u8>,
    pub src: MacAddress,
    pub dest: MacAddress,
    pub arrival_port: PortId,
}

/// Control payload the spanning-tree process wants sent out a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub payload: Vec<u8>,
    pub dest: MacAddress,
    pub target_port: PortId,
}

impl ControlRequest {
    pub fn new(payload: Vec<u8>, dest: MacAddress, target_port: PortId) -> Self {
        Self {
            payload,
            dest,
            target_port,
        }
    }
}

/// Sink for control frames addressed to the bridge.
///
/// Called while the relay holds its state read lock. Implementations may
/// call the relay's frame entry points but not `start`, `stop` or `crash`,
/// which would wait on that same lock.
pub trait ControlPlane: Send + Sync {
    fn deliver(&self, indication: BpduIndication);
}

/// Transmission path; fire-and-forget.
///
/// Same re-entry rules as [`ControlPlane`].
pub trait FrameSink: Send + Sync {
    fn transmit(&self, frame: EthernetFrame, port: PortId);
}

/// Forwards indications to an async STP task.
#[derive(Debug, Clone)]
pub struct ChannelControlPlane {
    tx: mpsc::UnboundedSender<BpduIndication>,
}

impl ChannelControlPlane {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BpduIndication>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ControlPlane for ChannelControlPlane {
    fn deliver(&self, indication: BpduIndication) {
        if self.tx.send(indication).is_err() {
            warn!("STP process is gone, BPDU discarded");
        }
    }
}

/// Hands outgoing frames to an async transmit task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(PortId, EthernetFrame)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(PortId, EthernetFrame)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn transmit(&self, frame: EthernetFrame, port: PortId) {
        if self.tx.send((port, frame)).is_err() {
            warn!("Transmit path for {} is gone, frame discarded", port);
        }
    }
}
