//! Relay statistics.
//!
//! Counters are observability only; the forwarding decision never reads them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RelayStats {
    received_network_frames: AtomicU64,
    received_bpdus_from_stp: AtomicU64,
    dropped_frames: AtomicU64,
    delivered_bpdus_to_stp: AtomicU64,
    dispatched_bpdu_frames: AtomicU64,
    dispatched_non_bpdu_frames: AtomicU64,
    flooded_frames: AtomicU64,
    unknown_unicast_floods: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub received_network_frames: u64,
    pub received_bpdus_from_stp: u64,
    pub dropped_frames: u64,
    pub delivered_bpdus_to_stp: u64,
    pub dispatched_bpdu_frames: u64,
    /// One per outgoing copy, so a flood to N ports counts N.
    pub dispatched_non_bpdu_frames: u64,
    pub flooded_frames: u64,
    pub unknown_unicast_floods: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_network_frame(&self) {
        bump(&self.received_network_frames);
    }

    pub fn record_bpdu_from_stp(&self) {
        bump(&self.received_bpdus_from_stp);
    }

    pub fn record_drop(&self) {
        bump(&self.dropped_frames);
    }

    pub fn record_bpdu_delivered(&self) {
        bump(&self.delivered_bpdus_to_stp);
    }

    pub fn record_bpdu_dispatched(&self) {
        bump(&self.dispatched_bpdu_frames);
    }

    pub fn record_dispatch(&self) {
        bump(&self.dispatched_non_bpdu_frames);
    }

    pub fn record_flood(&self, unknown_unicast: bool) {
        bump(&self.flooded_frames);
        if unknown_unicast {
            bump(&self.unknown_unicast_floods);
        }
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received_network_frames: self.received_network_frames.load(Ordering::Relaxed),
            received_bpdus_from_stp: self.received_bpdus_from_stp.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            delivered_bpdus_to_stp: self.delivered_bpdus_to_stp.load(Ordering::Relaxed),
            dispatched_bpdu_frames: self.dispatched_bpdu_frames.load(Ordering::Relaxed),
            dispatched_non_bpdu_frames: self.dispatched_non_bpdu_frames.load(Ordering::Relaxed),
            flooded_frames: self.flooded_frames.load(Ordering::Relaxed),
            unknown_unicast_floods: self.unknown_unicast_floods.load(Ordering::Relaxed),
        }
    }
}
