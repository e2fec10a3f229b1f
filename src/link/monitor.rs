//! # Connectivity Monitor
//!
//! Single writer of link state and of the process-wide running flag.
//! Platform link events (parent connected, routing table changes, ...) are
//! folded into a [`LinkState`] that relay tasks read as snapshots.
//! Clearing the running flag wakes every task parked on a receive.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::transport::{PeerAddr, TransportKind};

/// Where the relay may currently forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayEndpoint {
    pub transport: TransportKind,
    pub peer: PeerAddr,
}

impl RelayEndpoint {
    pub fn new(transport: TransportKind, peer: PeerAddr) -> Self {
        Self { transport, peer }
    }
}

/// Current link picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    /// Usable uplink towards radio/mesh peers
    pub connected: bool,
    /// Depth in the mesh tree (1 = root)
    pub layer: u8,
    pub endpoints: Vec<RelayEndpoint>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            connected: false,
            layer: 0,
            endpoints: Vec::new(),
        }
    }
}

impl LinkState {
    /// Forwarding is possible right now
    pub fn can_forward(&self) -> bool {
        self.connected && !self.endpoints.is_empty()
    }
}

/// Link notifications from the radio/mesh platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Transport stack started, no parent yet
    Started,
    ParentConnected { layer: u8 },
    ParentDisconnected { reason: String },
    LayerChanged { layer: u8 },
    RoutingTableAdd(Vec<RelayEndpoint>),
    RoutingTableRemove(Vec<RelayEndpoint>),
    /// Transport stack stopped
    Stopped,
}

/// Owner of the link state and the running flag
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<LinkState>,
    running: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LinkState::default());
        let (running, _) = watch::channel(true);
        Self { state, running }
    }

    /// Read-side handle for a relay task
    pub fn watch(&self) -> LinkWatch {
        LinkWatch {
            state: self.state.subscribe(),
            running: self.running.subscribe(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    /// Apply one platform event
    pub fn handle(&self, event: LinkEvent) {
        self.state.send_modify(|state| match event {
            LinkEvent::Started => {
                info!("Link stack started");
                state.connected = false;
            }
            LinkEvent::ParentConnected { layer } => {
                info!("Link up, layer {} -> {}", state.layer, layer);
                state.connected = true;
                state.layer = layer;
            }
            LinkEvent::ParentDisconnected { reason } => {
                warn!("Link down: {}", reason);
                state.connected = false;
            }
            LinkEvent::LayerChanged { layer } => {
                info!("Layer change {} -> {}", state.layer, layer);
                state.layer = layer;
            }
            LinkEvent::RoutingTableAdd(added) => {
                for endpoint in added {
                    if !state.endpoints.contains(&endpoint) {
                        state.endpoints.push(endpoint);
                    }
                }
                info!(
                    "Routing table add, {} endpoint(s), layer {}",
                    state.endpoints.len(),
                    state.layer
                );
            }
            LinkEvent::RoutingTableRemove(removed) => {
                state.endpoints.retain(|endpoint| !removed.contains(endpoint));
                info!(
                    "Routing table remove, {} endpoint(s), layer {}",
                    state.endpoints.len(),
                    state.layer
                );
            }
            LinkEvent::Stopped => {
                info!("Link stack stopped");
                state.connected = false;
                state.endpoints.clear();
            }
        });
    }

    /// Clear the running flag; every task exits at its next check or wakes
    /// from its pending receive
    pub fn shutdown(&self) {
        self.running.send_replace(false);
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the monitor, one per task
#[derive(Debug, Clone)]
pub struct LinkWatch {
    state: watch::Receiver<LinkState>,
    running: watch::Receiver<bool>,
}

impl LinkWatch {
    pub fn snapshot(&self) -> LinkState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolves once the running flag is cleared or the monitor is dropped
    pub async fn stopped(&mut self) {
        let _ = self.running.wait_for(|running| !*running).await;
    }
}
