//! Address learning table.
//!
//! Maps a source hardware address to the port it was last seen on.
//! [`MacTable`] shards its entries with `DashMap`, so lookups and updates for
//! different addresses proceed in parallel while writes to one address are
//! serialized (last writer wins).

use bridge_types::{MacAddress, PortId};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Learning table as seen by the forwarding engine.
pub trait MacAddressTable: Send + Sync {
    /// Records that `address` was seen on `port`.
    fn upsert(&self, address: MacAddress, port: PortId);

    /// Port `address` was last seen on.
    fn lookup(&self, address: &MacAddress) -> Option<PortId>;

    /// Removes every entry.
    fn clear(&self);

    /// Number of stored entries (including not yet aged-out ones).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct MacEntry {
    port: PortId,
    last_seen: Instant,
}

/// In-memory learning table with optional aging.
#[derive(Debug, Default)]
pub struct MacTable {
    entries: DashMap<MacAddress, MacEntry>,
    aging_time: Option<Duration>,
}

impl MacTable {
    /// Creates a table whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table whose entries expire `aging_time` after last being seen.
    pub fn with_aging(aging_time: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            aging_time,
        }
    }

    pub fn aging_time(&self) -> Option<Duration> {
        self.aging_time
    }

    /// Removes expired entries, returning how many were dropped.
    pub fn age_out(&self) -> usize {
        self.age_out_at(Instant::now())
    }

    pub(crate) fn age_out_at(&self, now: Instant) -> usize {
        let Some(aging_time) = self.aging_time else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|address, entry| {
            let keep = now.saturating_duration_since(entry.last_seen) < aging_time;
            if !keep {
                trace!("Aging out {} on {}", address, entry.port);
            }
            keep
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Aged out {} learning table entries", removed);
        }
        removed
    }

    pub(crate) fn lookup_at(&self, address: &MacAddress, now: Instant) -> Option<PortId> {
        let entry = self.entries.get(address)?;
        match self.aging_time {
            Some(aging_time) if now.saturating_duration_since(entry.last_seen) >= aging_time => None,
            _ => Some(entry.port),
        }
    }

    /// Sorted copy of all entries.
    pub fn entries(&self) -> Vec<(MacAddress, PortId)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().port))
            .collect();
        out.sort();
        out
    }
}

impl MacAddressTable for MacTable {
    fn upsert(&self, address: MacAddress, port: PortId) {
        let entry = MacEntry {
            port,
            last_seen: Instant::now(),
        };
        if let Some(previous) = self.entries.insert(address, entry) {
            if previous.port != port {
                debug!("{} moved from {} to {}", address, previous.port, port);
            }
        } else {
            trace!("Learned {} on {}", address, port);
        }
    }

    fn lookup(&self, address: &MacAddress) -> Option<PortId> {
        self.lookup_at(address, Instant::now())
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
