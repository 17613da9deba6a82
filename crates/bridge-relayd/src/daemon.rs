//! RelayDaemon implementation.
//!
//! The daemon owns the relay's event queue. Frames from the network,
//! control frames from the STP process and lifecycle operations all arrive
//! on one channel and are handled one at a time, to completion.

use crate::control::ControlRequest;
use crate::error::{RelayError, Result};
use crate::frame::EthernetFrame;
use crate::lifecycle::LifecycleOperation;
use crate::mac_table::MacTable;
use crate::relay::Relay;
use crate::stats::RelayStatsSnapshot;
use bridge_types::PortId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shortest aging sweep period; `tokio::time::interval` rejects zero.
const MIN_AGING_INTERVAL: Duration = Duration::from_millis(1);

/// Work item for the relay.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Frame { frame: EthernetFrame, arrival: PortId },
    /// Undecoded bytes starting at the destination address.
    RawFrame { bytes: Vec<u8>, arrival: PortId },
    Control(ControlRequest),
    Lifecycle(LifecycleOperation),
}

/// Cloneable sender side of the daemon's event queue.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayEvent>,
}

impl RelayHandle {
    pub async fn frame(&self, frame: EthernetFrame, arrival: PortId) -> Result<()> {
        self.send(RelayEvent::Frame { frame, arrival }).await
    }

    pub async fn raw_frame(&self, bytes: Vec<u8>, arrival: PortId) -> Result<()> {
        self.send(RelayEvent::RawFrame { bytes, arrival }).await
    }

    pub async fn control(&self, request: ControlRequest) -> Result<()> {
        self.send(RelayEvent::Control(request)).await
    }

    pub async fn lifecycle(&self, operation: LifecycleOperation) -> Result<()> {
        self.send(RelayEvent::Lifecycle(operation)).await
    }

    async fn send(&self, event: RelayEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| RelayError::ChannelClosed)
    }
}

/// The relay's event loop.
pub struct RelayDaemon {
    relay: Arc<Relay>,
    events: mpsc::Receiver<RelayEvent>,
    /// Table to age, when the relay learns into a [`MacTable`] with aging.
    aging: Option<Arc<MacTable>>,
    aging_interval: Duration,
}

impl RelayDaemon {
    /// Creates a daemon with an event queue of `queue_depth` entries.
    pub fn new(relay: Arc<Relay>, queue_depth: usize) -> (Self, RelayHandle) {
        let (tx, events) = mpsc::channel(queue_depth.max(1));
        let daemon = Self {
            relay,
            events,
            aging: None,
            aging_interval: Duration::from_secs(1),
        };
        (daemon, RelayHandle { tx })
    }

    /// Periodically removes expired entries from `table`.
    ///
    /// `interval` is raised to at least one millisecond.
    pub fn with_aging(mut self, table: Arc<MacTable>, interval: Duration) -> Self {
        self.aging = Some(table);
        self.aging_interval = interval.max(MIN_AGING_INTERVAL);
        self
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Handles one event.
    pub fn handle_event(&self, event: RelayEvent) -> Result<()> {
        match event {
            RelayEvent::Frame { frame, arrival } => {
                let decision = self.relay.on_frame_received(frame, arrival)?;
                debug!("Frame on {}: {:?}", arrival, decision);
            }
            RelayEvent::RawFrame { bytes, arrival } => {
                let frame = EthernetFrame::parse(&bytes)?;
                let decision = self.relay.on_frame_received(frame, arrival)?;
                debug!("Frame on {}: {:?}", arrival, decision);
            }
            RelayEvent::Control(request) => {
                self.relay.on_control_frame_from_control_plane(request)?;
            }
            RelayEvent::Lifecycle(operation) => {
                info!("Lifecycle operation {:?}", operation);
                self.relay.handle_operation_stage(operation)?;
            }
        }
        Ok(())
    }

    /// Runs until `shutdown` resolves or every handle is dropped.
    ///
    /// On the way out the relay is stopped and its final counters returned.
    /// A fatal relay error crashes the relay, ends the loop and is returned
    /// instead; other errors discard the event.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RelayStatsSnapshot>
    where
        F: Future<Output = ()>,
    {
        info!("Starting relay event loop");
        tokio::pin!(shutdown);

        let mut aging_timer = tokio::time::interval(self.aging_interval);
        aging_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        info!("All relay handles dropped");
                        break;
                    };
                    match self.handle_event(event) {
                        Ok(()) => {}
                        Err(e) if e.is_fatal() => {
                            error!("Fatal relay error: {}", e);
                            self.relay.crash();
                            return Err(e);
                        }
                        Err(e) => warn!("Discarding event: {}", e),
                    }
                }
                _ = aging_timer.tick(), if self.aging.is_some() => {
                    if let Some(table) = &self.aging {
                        table.age_out();
                    }
                }
            }
        }

        self.relay.stop();
        info!("Relay event loop stopped");
        Ok(self.relay.finish())
    }
}
