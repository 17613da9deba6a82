//! IEEE 802.1D relay: the frame forwarding decision.
//!
//! Every arriving frame is handled to completion under the relay's state
//! read lock. Lifecycle transitions take the write lock, so no decision ever
//! straddles a start, stop or crash. The read lock is taken recursively:
//! a collaborator may call back into the relay from `transmit` or `deliver`
//! even while a transition is waiting for the write lock.
//!
//! The checks in [`Relay::on_frame_received`] run in a fixed order:
//!
//! 1. relay down: drop
//! 2. learn the source address
//! 3. BPDU for the bridge on a non-disabled port: hand to STP
//! 4. arrival port not forwarding: drop
//! 5. broadcast: flood
//! 6. unicast: forward to the learned port, flood if unknown, drop if the
//!    learned port is the arrival port or not forwarding

use crate::config::RelayConfig;
use crate::control::{BpduIndication, ControlPlane, ControlRequest, FrameSink};
use crate::error::{RelayError, Result};
use crate::frame::EthernetFrame;
use crate::lifecycle::{LifecycleAction, LifecycleOperation, OperationalState};
use crate::mac_table::MacAddressTable;
use crate::ports::{forwarding_eligible, learning_eligible, PortInfo, PortSnapshot, PortTable};
use crate::stats::{RelayStats, RelayStatsSnapshot};
use bridge_types::{MacAddress, PortId};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a frame was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The relay is not operating.
    RelayDown,
    /// Spanning tree keeps the arrival port out of the data path.
    ArrivalPortNotForwarding,
    /// Destination was learned on the arrival port.
    SamePort,
    /// Destination was learned on a port that is not forwarding.
    OutputPortNotForwarding,
    /// Flooding found no port to send on.
    NoEligiblePorts,
    /// Destination was learned on a port the port table no longer has.
    StaleEntry,
}

/// Outcome of handling one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingDecision {
    Dropped(DropReason),
    Unicast(PortId),
    Flooded(Vec<PortId>),
    DeliveredToControlPlane,
}

impl ForwardingDecision {
    /// Ports the frame was transmitted on.
    pub fn output_ports(&self) -> &[PortId] {
        match self {
            ForwardingDecision::Unicast(port) => std::slice::from_ref(port),
            ForwardingDecision::Flooded(ports) => ports,
            _ => &[],
        }
    }
}

#[derive(Debug, Default)]
struct RelayState {
    operational: OperationalState,
    /// Chosen on start, cleared on stop.
    bridge_address: Option<MacAddress>,
}

/// The bridge relay.
pub struct Relay {
    stp_aware: bool,
    state: RwLock<RelayState>,
    ports: Arc<dyn PortTable>,
    mac_table: Arc<dyn MacAddressTable>,
    sink: Arc<dyn FrameSink>,
    control: Arc<dyn ControlPlane>,
    stats: RelayStats,
}

impl Relay {
    /// Creates a relay over the given collaborators.
    ///
    /// With `start_operational` the bridge address is chosen right away and
    /// a port table without a non-loopback port is rejected.
    pub fn new(
        config: &RelayConfig,
        ports: Arc<dyn PortTable>,
        mac_table: Arc<dyn MacAddressTable>,
        sink: Arc<dyn FrameSink>,
        control: Arc<dyn ControlPlane>,
    ) -> Result<Self> {
        let relay = Self {
            stp_aware: config.stp_aware,
            state: RwLock::new(RelayState::default()),
            ports,
            mac_table,
            sink,
            control,
            stats: RelayStats::new(),
        };

        if config.start_operational {
            let mut state = relay.state.write();
            relay.bring_up(&mut state)?;
        }

        info!(
            "Relay created: {} ports, stp_aware={}",
            relay.ports.count(),
            relay.stp_aware
        );
        Ok(relay)
    }

    pub fn stp_aware(&self) -> bool {
        self.stp_aware
    }

    pub fn operational_state(&self) -> OperationalState {
        self.state.read_recursive().operational
    }

    pub fn is_operational(&self) -> bool {
        self.operational_state().is_operating()
    }

    /// Hardware address the bridge uses for its own frames.
    pub fn bridge_address(&self) -> Option<MacAddress> {
        self.state.read_recursive().bridge_address
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Handles a frame received from the network on `arrival`.
    ///
    /// Returns an error only for conditions that must stop the bridge:
    /// an unknown arrival port, or a port without spanning-tree data while
    /// the relay is STP aware.
    pub fn on_frame_received(
        &self,
        frame: EthernetFrame,
        arrival: PortId,
    ) -> Result<ForwardingDecision> {
        let state = self.state.read_recursive();

        if !state.operational.is_operating() {
            warn!(
                "Frame from {} arrived on {} when relay is down, dropped it",
                frame.src, arrival
            );
            self.stats.record_drop();
            return Ok(ForwardingDecision::Dropped(DropReason::RelayDown));
        }

        if frame.src.is_multicast() {
            warn!(
                "Frame on {} carries group source address {}, learning it anyway",
                arrival, frame.src
            );
        }

        self.stats.record_network_frame();
        debug!("Received frame {} -> {} on {}", frame.src, frame.dest, arrival);

        let ports = self.ports.snapshot();
        let arrival_port = ports.get(arrival).ok_or(RelayError::UnknownPort(arrival))?;
        let arrival_role = if self.stp_aware {
            Some(arrival_port.stp_role()?)
        } else {
            None
        };

        self.learn(frame.src, arrival_port)?;

        if let Some(role) = arrival_role {
            if self.is_bpdu_destination(&frame.dest, state.bridge_address) && !role.is_disabled() {
                debug!("Deliver BPDU to the STP/RSTP process");
                return Ok(self.deliver_bpdu(frame, arrival));
            }
            if !role.is_forwarding() {
                info!("The arrival port {} is not forwarding, discarding frame", arrival);
                return Ok(self.drop_frame(DropReason::ArrivalPortNotForwarding));
            }
        }

        if frame.dest.is_broadcast() {
            return self.flood(frame, arrival, &ports, false);
        }

        let Some(output) = self.mac_table.lookup(&frame.dest) else {
            debug!("Destination address {} unknown, broadcasting frame", frame.dest);
            return self.flood(frame, arrival, &ports, true);
        };

        if output == arrival {
            debug!(
                "Output port is same as input port {}, destination {}, discarding frame",
                arrival, frame.dest
            );
            return Ok(self.drop_frame(DropReason::SamePort));
        }

        let Some(output_port) = ports.get(output) else {
            warn!(
                "Destination {} learned on {} which no longer exists, discarding frame",
                frame.dest, output
            );
            return Ok(self.drop_frame(DropReason::StaleEntry));
        };

        if !forwarding_eligible(output_port, self.stp_aware)? {
            info!(
                "Output port {} ({}) is not forwarding, discarding frame",
                output, output_port.name
            );
            return Ok(self.drop_frame(DropReason::OutputPortNotForwarding));
        }

        self.dispatch(frame, output_port);
        Ok(ForwardingDecision::Unicast(output))
    }

    /// Sends a control payload from the STP process out `target_port`,
    /// wrapped in an Ethernet frame sourced from the bridge address.
    pub fn on_control_frame_from_control_plane(
        &self,
        request: ControlRequest,
    ) -> Result<ForwardingDecision> {
        let state = self.state.read_recursive();

        if !state.operational.is_operating() {
            warn!(
                "BPDU for {} arrived from STP when relay is down, dropped it",
                request.target_port
            );
            self.stats.record_drop();
            return Ok(ForwardingDecision::Dropped(DropReason::RelayDown));
        }

        self.stats.record_bpdu_from_stp();

        let target = request.target_port;
        if self.ports.port_by_id(target).is_none() {
            return Err(RelayError::UnknownPort(target));
        }
        let Some(bridge_address) = state.bridge_address else {
            return Err(RelayError::NoNonLoopbackPort);
        };

        let frame = EthernetFrame::llc(bridge_address, request.dest, request.payload);
        info!(
            "Sending BPDU frame with destination {} on {}",
            frame.dest, target
        );
        self.stats.record_bpdu_dispatched();
        self.sink.transmit(frame, target);
        Ok(ForwardingDecision::Unicast(target))
    }

    /// Applies one stage of a node lifecycle operation.
    pub fn handle_operation_stage(&self, operation: LifecycleOperation) -> Result<()> {
        match operation.action() {
            LifecycleAction::Start => self.start(),
            LifecycleAction::Stop => {
                self.stop();
                Ok(())
            }
            LifecycleAction::Crash => {
                self.crash();
                Ok(())
            }
            LifecycleAction::None => Ok(()),
        }
    }

    /// Chooses the bridge address, clears the learning table and starts
    /// forwarding.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        self.bring_up(&mut state)
    }

    /// Graceful shutdown.
    pub fn stop(&self) {
        let mut state = self.state.write();
        self.bring_down(&mut state);
        info!("Relay stopped");
    }

    /// Abnormal termination; same effect as [`Relay::stop`].
    pub fn crash(&self) {
        let mut state = self.state.write();
        self.bring_down(&mut state);
        warn!("Relay crashed");
    }

    /// Logs the final counters and returns them.
    pub fn finish(&self) -> RelayStatsSnapshot {
        let stats = self.stats.snapshot();
        info!("number of received BPDUs from STP module: {}", stats.received_bpdus_from_stp);
        info!(
            "number of received frames from network (including BPDUs): {}",
            stats.received_network_frames
        );
        info!("number of dropped frames (including BPDUs): {}", stats.dropped_frames);
        info!("number of delivered BPDUs to the STP module: {}", stats.delivered_bpdus_to_stp);
        info!("number of dispatched BPDU frames to the network: {}", stats.dispatched_bpdu_frames);
        info!(
            "number of dispatched non-BPDU frames to the network: {}",
            stats.dispatched_non_bpdu_frames
        );
        stats
    }

    fn bring_up(&self, state: &mut RelayState) -> Result<()> {
        let address = self
            .ports
            .snapshot()
            .first_non_loopback()
            .map(|p| p.mac)
            .ok_or(RelayError::NoNonLoopbackPort)?;

        self.mac_table.clear();
        state.bridge_address = Some(address);
        state.operational = OperationalState::Operating;
        info!("Relay operating with bridge address {}", address);
        Ok(())
    }

    fn bring_down(&self, state: &mut RelayState) {
        self.mac_table.clear();
        state.bridge_address = None;
        state.operational = OperationalState::Down;
    }

    fn is_bpdu_destination(&self, dest: &MacAddress, bridge_address: Option<MacAddress>) -> bool {
        *dest == MacAddress::STP_MULTICAST || Some(*dest) == bridge_address
    }

    fn learn(&self, src: MacAddress, arrival: &PortInfo) -> Result<()> {
        if learning_eligible(arrival, self.stp_aware)? {
            self.mac_table.upsert(src, arrival.id);
        }
        Ok(())
    }

    fn flood(
        &self,
        frame: EthernetFrame,
        arrival: PortId,
        ports: &PortSnapshot,
        unknown_unicast: bool,
    ) -> Result<ForwardingDecision> {
        let targets = ports.flood_targets(arrival, self.stp_aware)?;
        let Some((&last, rest)) = targets.split_last() else {
            debug!("No port to flood frame from {} on, discarding", arrival);
            return Ok(self.drop_frame(DropReason::NoEligiblePorts));
        };

        debug!("Broadcast frame {} -> {} on {} ports", frame.src, frame.dest, targets.len());
        self.stats.record_flood(unknown_unicast);
        for &port in rest {
            self.transmit(frame.clone(), port);
        }
        self.transmit(frame, last);
        Ok(ForwardingDecision::Flooded(targets))
    }

    fn dispatch(&self, frame: EthernetFrame, port: &PortInfo) {
        debug!(
            "Sending frame on output interface {} with destination {}",
            port.name, frame.dest
        );
        self.transmit(frame, port.id);
    }

    fn transmit(&self, frame: EthernetFrame, port: PortId) {
        self.stats.record_dispatch();
        self.sink.transmit(frame, port);
    }

    fn deliver_bpdu(&self, frame: EthernetFrame, arrival: PortId) -> ForwardingDecision {
        let (src, dest) = (frame.src, frame.dest);
        let indication = BpduIndication {
            payload: frame.into_payload(),
            src,
            dest,
            arrival_port: arrival,
        };

        debug!("Sending BPDU from {} to the STP/RSTP module", src);
        self.stats.record_bpdu_delivered();
        self.control.deliver(indication);
        ForwardingDecision::DeliveredToControlPlane
    }

    fn drop_frame(&self, reason: DropReason) -> ForwardingDecision {
        self.stats.record_drop();
        ForwardingDecision::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CrashStage, ShutdownStage, StartStage};
    use crate::mac_table::MacTable;
    use crate::ports::InterfaceTable;
    use bridge_types::PortRole;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(PortId, EthernetFrame)>>,
    }

    impl FrameSink for RecordingSink {
        fn transmit(&self, frame: EthernetFrame, port: PortId) {
            self.sent.lock().push((port, frame));
        }
    }

    impl RecordingSink {
        fn ports(&self) -> Vec<PortId> {
            self.sent.lock().iter().map(|(p, _)| *p).collect()
        }
    }

    #[derive(Default)]
    struct RecordingControl {
        delivered: Mutex<Vec<BpduIndication>>,
    }

    impl ControlPlane for RecordingControl {
        fn deliver(&self, indication: BpduIndication) {
            self.delivered.lock().push(indication);
        }
    }

    struct Fixture {
        relay: Relay,
        ports: Arc<InterfaceTable>,
        table: Arc<MacTable>,
        sink: Arc<RecordingSink>,
        control: Arc<RecordingControl>,
    }

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0x02, 0, 0, 0, 0, last])
    }

    fn port(id: u32) -> PortInfo {
        PortInfo::new(PortId(id), MacAddress::new([0x02, 0xaa, 0, 0, 0, id as u8]))
    }

    fn fixture(stp_aware: bool, ports: Vec<PortInfo>) -> Fixture {
        let config = RelayConfig {
            stp_aware,
            ..RelayConfig::default()
        };
        let ports = Arc::new(InterfaceTable::new(ports));
        let table = Arc::new(MacTable::new());
        let sink = Arc::new(RecordingSink::default());
        let control = Arc::new(RecordingControl::default());
        let relay = Relay::new(
            &config,
            ports.clone(),
            table.clone(),
            sink.clone(),
            control.clone(),
        )
        .unwrap();
        Fixture {
            relay,
            ports,
            table,
            sink,
            control,
        }
    }

    fn three_ports() -> Vec<PortInfo> {
        vec![port(0), port(1), port(2)]
    }

    fn stp_ports(roles: &[PortRole]) -> Vec<PortInfo> {
        roles
            .iter()
            .enumerate()
            .map(|(i, role)| port(i as u32).with_role(*role))
            .collect()
    }

    fn frame(src: MacAddress, dest: MacAddress) -> EthernetFrame {
        EthernetFrame::new(src, dest, 0x0800, b"payload".to_vec())
    }

    #[test]
    fn test_new_selects_first_non_loopback_address() {
        let f = fixture(false, vec![port(7).loopback(), port(3), port(1)]);
        assert!(f.relay.is_operational());
        assert_eq!(f.relay.bridge_address(), Some(port(3).mac));
    }

    #[test]
    fn test_new_fails_without_non_loopback_port() {
        let config = RelayConfig::default();
        let result = Relay::new(
            &config,
            Arc::new(InterfaceTable::new(vec![port(0).loopback()])),
            Arc::new(MacTable::new()),
            Arc::new(RecordingSink::default()),
            Arc::new(RecordingControl::default()),
        );
        assert!(matches!(result, Err(RelayError::NoNonLoopbackPort)));
    }

    #[test]
    fn test_new_down_when_not_start_operational() {
        let config = RelayConfig {
            start_operational: false,
            ..RelayConfig::default()
        };
        let relay = Relay::new(
            &config,
            Arc::new(InterfaceTable::new(vec![port(0).loopback()])),
            Arc::new(MacTable::new()),
            Arc::new(RecordingSink::default()),
            Arc::new(RecordingControl::default()),
        )
        .unwrap();
        assert_eq!(relay.operational_state(), OperationalState::Down);
        assert_eq!(relay.bridge_address(), None);
        assert!(matches!(relay.start(), Err(RelayError::NoNonLoopbackPort)));
        assert!(!relay.is_operational());
    }

    #[test]
    fn test_broadcast_floods_and_learns() {
        let f = fixture(false, three_ports());

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Flooded(vec![PortId(0), PortId(2)]));
        assert_eq!(f.sink.ports(), vec![PortId(0), PortId(2)]);
        assert_eq!(f.table.entries(), vec![(mac(0xa), PortId(1))]);

        let stats = f.relay.stats();
        assert_eq!(stats.received_network_frames, 1);
        assert_eq!(stats.flooded_frames, 1);
        assert_eq!(stats.unknown_unicast_floods, 0);
        assert_eq!(stats.dispatched_non_bpdu_frames, 2);
    }

    #[test]
    fn test_known_unicast_goes_out_one_port() {
        let f = fixture(false, three_ports());
        f.relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xb), mac(0xa)), PortId(2))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Unicast(PortId(1)));
        assert_eq!(f.sink.ports(), vec![PortId(0), PortId(2), PortId(1)]);
        assert_eq!(
            f.table.entries(),
            vec![(mac(0xa), PortId(1)), (mac(0xb), PortId(2))]
        );
    }

    #[test]
    fn test_unknown_unicast_floods() {
        let f = fixture(false, three_ports());

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), mac(0xc)), PortId(0))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Flooded(vec![PortId(1), PortId(2)]));
        assert_eq!(f.relay.stats().unknown_unicast_floods, 1);
    }

    #[test]
    fn test_same_port_is_dropped() {
        let f = fixture(false, three_ports());
        f.table.upsert(mac(0xc), PortId(1));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xc), mac(0xc)), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Dropped(DropReason::SamePort));
        assert!(f.sink.ports().is_empty());
        assert_eq!(f.relay.stats().dropped_frames, 1);
    }

    #[test]
    fn test_stale_entry_is_dropped() {
        let f = fixture(false, three_ports());
        f.table.upsert(mac(0xd), PortId(42));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), mac(0xd)), PortId(0))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Dropped(DropReason::StaleEntry));
        assert!(f.sink.ports().is_empty());
    }

    #[test]
    fn test_unknown_arrival_port_is_fatal() {
        let f = fixture(false, three_ports());
        let err = f
            .relay
            .on_frame_received(frame(mac(0xa), mac(0xb)), PortId(9))
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownPort(PortId(9))));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_flood_with_no_other_port_is_a_drop() {
        let f = fixture(false, vec![port(0).loopback(), port(1)]);

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Dropped(DropReason::NoEligiblePorts));
        assert_eq!(f.relay.stats().dropped_frames, 1);
        assert_eq!(f.relay.stats().flooded_frames, 0);
    }

    #[test]
    fn test_stp_bpdu_on_blocking_port_reaches_control_plane() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Blocking, Forwarding]));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::STP_MULTICAST), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::DeliveredToControlPlane);
        assert!(f.sink.ports().is_empty());
        let delivered = f.control.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].src, mac(0xa));
        assert_eq!(delivered[0].dest, MacAddress::STP_MULTICAST);
        assert_eq!(delivered[0].arrival_port, PortId(1));
        assert_eq!(delivered[0].payload, b"payload".to_vec());
        // Blocking ports do not learn.
        assert!(f.table.is_empty());
    }

    #[test]
    fn test_frame_to_bridge_address_reaches_control_plane() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Learning]));
        let bridge = f.relay.bridge_address().unwrap();

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), bridge), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::DeliveredToControlPlane);
        assert_eq!(f.relay.stats().delivered_bpdus_to_stp, 1);
        // Learning ports learn even when the frame goes to STP.
        assert_eq!(f.table.lookup(&mac(0xa)), Some(PortId(1)));
    }

    #[test]
    fn test_bpdu_on_disabled_port_is_dropped() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Disabled]));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::STP_MULTICAST), PortId(1))
            .unwrap();

        assert_eq!(
            decision,
            ForwardingDecision::Dropped(DropReason::ArrivalPortNotForwarding)
        );
        assert!(f.control.delivered.lock().is_empty());
    }

    #[test]
    fn test_bpdu_is_forwarded_when_not_stp_aware() {
        let f = fixture(false, three_ports());

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::STP_MULTICAST), PortId(0))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Flooded(vec![PortId(1), PortId(2)]));
        assert!(f.control.delivered.lock().is_empty());
    }

    #[test]
    fn test_data_on_learning_port_is_learned_then_dropped() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Learning, Forwarding]));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();

        assert_eq!(
            decision,
            ForwardingDecision::Dropped(DropReason::ArrivalPortNotForwarding)
        );
        assert_eq!(f.table.lookup(&mac(0xa)), Some(PortId(1)));
        assert!(f.sink.ports().is_empty());
    }

    #[test]
    fn test_unicast_to_non_forwarding_port_is_dropped() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Forwarding, Blocking]));
        f.table.upsert(mac(0xb), PortId(2));

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), mac(0xb)), PortId(1))
            .unwrap();

        assert_eq!(
            decision,
            ForwardingDecision::Dropped(DropReason::OutputPortNotForwarding)
        );
    }

    #[test]
    fn test_missing_role_on_arrival_is_fatal() {
        let f = fixture(true, vec![port(0).with_role(PortRole::Forwarding), port(1)]);

        let err = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap_err();

        assert!(matches!(err, RelayError::MissingPortRole(PortId(1))));
        assert!(f.table.is_empty());
    }

    #[test]
    fn test_missing_role_during_flood_sends_nothing() {
        let f = fixture(
            true,
            vec![
                port(0).with_role(PortRole::Forwarding),
                port(1).with_role(PortRole::Forwarding),
                port(2),
            ],
        );

        let err = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(0))
            .unwrap_err();

        assert!(matches!(err, RelayError::MissingPortRole(PortId(2))));
        assert!(f.sink.ports().is_empty());
    }

    #[test]
    fn test_role_change_by_stp_process_is_observed() {
        use PortRole::*;
        let f = fixture(true, stp_ports(&[Forwarding, Blocking]));

        let blocked = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();
        assert_eq!(
            blocked,
            ForwardingDecision::Dropped(DropReason::ArrivalPortNotForwarding)
        );

        f.ports.set_role(PortId(1), Forwarding).unwrap();
        let flooded = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();
        assert_eq!(flooded, ForwardingDecision::Flooded(vec![PortId(0)]));
    }

    #[test]
    fn test_outbound_bpdu_is_wrapped_with_bridge_address() {
        let f = fixture(true, stp_ports(&[PortRole::Forwarding, PortRole::Blocking]));
        let bridge = f.relay.bridge_address().unwrap();

        let decision = f
            .relay
            .on_control_frame_from_control_plane(ControlRequest::new(
                vec![0u8; 35],
                MacAddress::STP_MULTICAST,
                PortId(1),
            ))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Unicast(PortId(1)));
        let sent = f.sink.sent.lock();
        assert_eq!(sent.len(), 1);
        let (port, frame) = &sent[0];
        assert_eq!(*port, PortId(1));
        assert_eq!(frame.src, bridge);
        assert_eq!(frame.dest, MacAddress::STP_MULTICAST);
        assert_eq!(frame.ether_type, 35);

        let stats = f.relay.stats();
        assert_eq!(stats.received_bpdus_from_stp, 1);
        assert_eq!(stats.dispatched_bpdu_frames, 1);
        assert_eq!(stats.dispatched_non_bpdu_frames, 0);
    }

    #[test]
    fn test_outbound_bpdu_to_unknown_port_is_fatal() {
        let f = fixture(false, three_ports());
        let err = f
            .relay
            .on_control_frame_from_control_plane(ControlRequest::new(
                vec![1],
                MacAddress::STP_MULTICAST,
                PortId(5),
            ))
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownPort(PortId(5))));
    }

    #[test]
    fn test_down_relay_drops_without_side_effects() {
        let f = fixture(false, three_ports());
        f.relay.stop();

        let decision = f
            .relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();
        assert_eq!(decision, ForwardingDecision::Dropped(DropReason::RelayDown));

        let outbound = f
            .relay
            .on_control_frame_from_control_plane(ControlRequest::new(
                vec![1],
                MacAddress::STP_MULTICAST,
                PortId(1),
            ))
            .unwrap();
        assert_eq!(outbound, ForwardingDecision::Dropped(DropReason::RelayDown));

        assert!(f.table.is_empty());
        assert!(f.sink.ports().is_empty());
        let stats = f.relay.stats();
        assert_eq!(stats.dropped_frames, 2);
        assert_eq!(stats.received_network_frames, 0);
    }

    #[test]
    fn test_stop_clears_table_and_identity() {
        let f = fixture(false, three_ports());
        f.relay
            .on_frame_received(frame(mac(0xa), MacAddress::BROADCAST), PortId(1))
            .unwrap();
        assert!(!f.table.is_empty());

        f.relay.stop();
        assert!(f.table.is_empty());
        assert_eq!(f.relay.bridge_address(), None);
        assert_eq!(f.relay.operational_state(), OperationalState::Down);
    }

    #[test]
    fn test_start_after_crash_recomputes_identity() {
        let f = fixture(false, three_ports());
        f.relay.crash();
        assert!(!f.relay.is_operational());

        f.relay.start().unwrap();
        assert!(f.relay.is_operational());
        assert_eq!(f.relay.bridge_address(), Some(port(0).mac));
        assert!(f.table.is_empty());
    }

    #[test]
    fn test_start_clears_table() {
        let f = fixture(false, three_ports());
        f.table.upsert(mac(0xa), PortId(1));
        f.relay.start().unwrap();
        assert!(f.table.is_empty());
    }

    #[test]
    fn test_operation_stages() {
        let f = fixture(false, three_ports());

        f.relay
            .handle_operation_stage(LifecycleOperation::Shutdown(ShutdownStage::NetworkLayer))
            .unwrap();
        assert!(f.relay.is_operational());

        f.relay
            .handle_operation_stage(LifecycleOperation::Shutdown(ShutdownStage::LinkLayer))
            .unwrap();
        assert!(!f.relay.is_operational());

        f.relay
            .handle_operation_stage(LifecycleOperation::Start(StartStage::PhysicalLayer))
            .unwrap();
        assert!(!f.relay.is_operational());

        f.relay
            .handle_operation_stage(LifecycleOperation::Start(StartStage::LinkLayer))
            .unwrap();
        assert!(f.relay.is_operational());

        f.relay
            .handle_operation_stage(LifecycleOperation::Crash(CrashStage::Crash))
            .unwrap();
        assert!(!f.relay.is_operational());
    }

    #[test]
    fn test_finish_returns_counters() {
        let f = fixture(false, three_ports());
        f.relay
            .on_frame_received(frame(mac(0xa), mac(0xb)), PortId(1))
            .unwrap();
        let stats = f.relay.finish();
        assert_eq!(stats, f.relay.stats());
        assert_eq!(stats.received_network_frames, 1);
    }

    #[test]
    fn test_group_source_address_is_learned_and_forwarded() {
        let f = fixture(false, three_ports());
        let group = MacAddress::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);

        let decision = f
            .relay
            .on_frame_received(frame(group, MacAddress::BROADCAST), PortId(1))
            .unwrap();

        assert_eq!(decision, ForwardingDecision::Flooded(vec![PortId(0), PortId(2)]));
        assert_eq!(f.table.lookup(&group), Some(PortId(1)));
        assert_eq!(f.relay.stats().received_network_frames, 1);
    }

    /// Answers every BPDU from inside `deliver`, after making a stop wait
    /// on the state lock.
    #[derive(Default)]
    struct AnsweringControl {
        relay: Mutex<Option<Arc<Relay>>>,
        stopper: Mutex<Option<std::thread::JoinHandle<()>>>,
        replies: Mutex<Vec<ForwardingDecision>>,
    }

    impl ControlPlane for AnsweringControl {
        fn deliver(&self, indication: BpduIndication) {
            let Some(relay) = self.relay.lock().clone() else {
                return;
            };
            let stopper = {
                let relay = Arc::clone(&relay);
                std::thread::spawn(move || relay.stop())
            };
            std::thread::sleep(std::time::Duration::from_millis(50));

            let reply = relay
                .on_control_frame_from_control_plane(ControlRequest::new(
                    indication.payload,
                    MacAddress::STP_MULTICAST,
                    indication.arrival_port,
                ))
                .unwrap();
            self.replies.lock().push(reply);
            *self.stopper.lock() = Some(stopper);
        }
    }

    #[test]
    fn test_control_plane_may_answer_while_stop_is_pending() {
        let config = RelayConfig {
            stp_aware: true,
            ..RelayConfig::default()
        };
        let sink = Arc::new(RecordingSink::default());
        let control = Arc::new(AnsweringControl::default());
        let relay = Arc::new(
            Relay::new(
                &config,
                Arc::new(InterfaceTable::new(stp_ports(&[
                    PortRole::Forwarding,
                    PortRole::Forwarding,
                ]))),
                Arc::new(MacTable::new()),
                sink.clone(),
                control.clone(),
            )
            .unwrap(),
        );
        *control.relay.lock() = Some(Arc::clone(&relay));

        let decision = relay
            .on_frame_received(frame(mac(0xa), MacAddress::STP_MULTICAST), PortId(1))
            .unwrap();
        assert_eq!(decision, ForwardingDecision::DeliveredToControlPlane);

        let stopper = control.stopper.lock().take().unwrap();
        stopper.join().unwrap();
        *control.relay.lock() = None;

        assert_eq!(
            *control.replies.lock(),
            vec![ForwardingDecision::Unicast(PortId(1))]
        );
        assert_eq!(sink.ports(), vec![PortId(1)]);
        assert!(!relay.is_operational());
    }

    #[test]
    fn test_output_ports() {
        assert_eq!(
            ForwardingDecision::Unicast(PortId(3)).output_ports(),
            &[PortId(3)]
        );
        assert_eq!(
            ForwardingDecision::Flooded(vec![PortId(1), PortId(2)]).output_ports(),
            &[PortId(1), PortId(2)]
        );
        assert!(ForwardingDecision::Dropped(DropReason::SamePort)
            .output_ports()
            .is_empty());
    }
}
