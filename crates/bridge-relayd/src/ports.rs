//! Port table and port eligibility.
//!
//! The port table is owned by whoever enumerates the interfaces; the
//! spanning-tree process updates port roles through [`InterfaceTable::set_role`].
//! The relay itself only reads, and takes one [`PortSnapshot`] per frame so
//! every check of a single forwarding decision sees the same port state.

use crate::config::PortConfig;
use crate::error::{RelayError, Result};
use bridge_types::{MacAddress, PortId, PortRole};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Metadata of a single bridge port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub id: PortId,
    pub name: String,
    pub mac: MacAddress,
    pub loopback: bool,
    pub broadcast: bool,
    /// Spanning-tree role; `None` when no STP data is attached.
    pub role: Option<PortRole>,
}

impl PortInfo {
    pub fn new(id: PortId, mac: MacAddress) -> Self {
        Self {
            id,
            name: id.to_string(),
            mac,
            loopback: false,
            broadcast: true,
            role: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_role(mut self, role: PortRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    pub fn without_broadcast(mut self) -> Self {
        self.broadcast = false;
        self
    }

    /// Role of the port, or an error if STP data is required but missing.
    pub fn stp_role(&self) -> Result<PortRole> {
        self.role.ok_or(RelayError::MissingPortRole(self.id))
    }
}

impl From<&PortConfig> for PortInfo {
    fn from(config: &PortConfig) -> Self {
        let name = if config.name.is_empty() {
            config.id.to_string()
        } else {
            config.name.clone()
        };
        Self {
            id: config.id,
            name,
            mac: config.mac,
            loopback: config.loopback,
            broadcast: config.broadcast,
            role: config.role,
        }
    }
}

/// Returns whether `port` may carry data traffic.
///
/// Without spanning-tree awareness every port is eligible.
pub fn forwarding_eligible(port: &PortInfo, stp_aware: bool) -> Result<bool> {
    if !stp_aware {
        return Ok(true);
    }
    Ok(port.stp_role()?.is_forwarding())
}

/// Returns whether source addresses arriving on `port` may be learned.
pub fn learning_eligible(port: &PortInfo, stp_aware: bool) -> Result<bool> {
    if !stp_aware {
        return Ok(true);
    }
    Ok(port.stp_role()?.is_learning())
}

/// Read access to the bridge's ports.
pub trait PortTable: Send + Sync {
    /// Number of ports.
    fn count(&self) -> usize;

    /// Looks up a port by id.
    fn port_by_id(&self, id: PortId) -> Option<PortInfo>;

    /// All ports in enumeration order.
    fn all_ports(&self) -> Vec<PortInfo>;

    /// Current spanning-tree role of a port.
    fn role(&self, id: PortId) -> Option<PortRole> {
        self.port_by_id(id).and_then(|p| p.role)
    }

    /// Captures every port at once.
    fn snapshot(&self) -> PortSnapshot {
        PortSnapshot::new(self.all_ports())
    }
}

/// Consistent view of the port table for the duration of one decision.
///
/// Cloning shares the port list.
#[derive(Debug, Clone)]
pub struct PortSnapshot {
    ports: Arc<[PortInfo]>,
}

impl PortSnapshot {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self {
            ports: ports.into(),
        }
    }

    pub fn get(&self, id: PortId) -> Option<&PortInfo> {
        self.ports.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortInfo> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// First port in enumeration order that is not a loopback.
    pub fn first_non_loopback(&self) -> Option<&PortInfo> {
        self.ports.iter().find(|p| !p.loopback)
    }

    /// Ports a flooded frame arriving on `arrival` goes out on.
    ///
    /// Loopback and non-broadcast ports are skipped before eligibility is
    /// evaluated, so they never need STP data.
    pub fn flood_targets(&self, arrival: PortId, stp_aware: bool) -> Result<Vec<PortId>> {
        let mut targets = Vec::new();
        for port in self.ports.iter() {
            if port.loopback || !port.broadcast || port.id == arrival {
                continue;
            }
            if forwarding_eligible(port, stp_aware)? {
                targets.push(port.id);
            }
        }
        Ok(targets)
    }
}

/// In-memory port table shared between the relay and the STP process.
///
/// Readers share one immutable port list; a role update publishes a new
/// list, leaving snapshots already taken untouched.
#[derive(Debug)]
pub struct InterfaceTable {
    ports: RwLock<Arc<[PortInfo]>>,
}

impl InterfaceTable {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self {
            ports: RwLock::new(ports.into()),
        }
    }

    pub fn from_config(configs: &[PortConfig]) -> Self {
        Self::new(configs.iter().map(PortInfo::from).collect())
    }

    /// Updates the spanning-tree role of a port.
    pub fn set_role(&self, id: PortId, role: PortRole) -> Result<()> {
        let mut ports = self.ports.write();
        let mut next = ports.to_vec();
        let port = next
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RelayError::UnknownPort(id))?;
        debug!("{} ({}) role {:?} -> {}", port.id, port.name, port.role, role);
        port.role = Some(role);
        *ports = next.into();
        Ok(())
    }
}

impl PortTable for InterfaceTable {
    fn count(&self) -> usize {
        self.ports.read().len()
    }

    fn port_by_id(&self, id: PortId) -> Option<PortInfo> {
        self.ports.read().iter().find(|p| p.id == id).cloned()
    }

    fn all_ports(&self) -> Vec<PortInfo> {
        self.ports.read().to_vec()
    }

    fn snapshot(&self) -> PortSnapshot {
        PortSnapshot {
            ports: Arc::clone(&self.ports.read()),
        }
    }
}
