//! # Relay
//!
//! Moves messages between the flight controller and the network.
//!
//! Two independent tasks, each owning its buffers:
//! - [`uplink::Uplink`]: serial -> framer -> every known radio/mesh peer,
//!   only while the Connectivity Monitor reports a usable link
//! - [`downlink::Downlink`]: radio/mesh -> serial, unconditionally, plus
//!   the status beacon
//!
//! Frames are inspected by the [`Profile`] in both directions.
//!
//! Both loops exit when the monitor clears the running flag.

pub mod downlink;
pub mod profile;
pub mod stats;
pub mod uplink;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{RelayError, Result};
use crate::framing::marker::DEFAULT_FRAME_CAPACITY;
use crate::link::monitor::{LinkState, LinkWatch};
use crate::serial::port_trait::{SerialPortIO, SerialRead};
use crate::telemetry::TelemetrySink;
use crate::transport::{Transport, TransportKind};
use downlink::Downlink;
pub use profile::Profile;
pub use stats::{RelayStats, StatsSnapshot};
use uplink::Uplink;

/// Tunables for both relay directions
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub frame_capacity: usize,
    /// Forward `encode(record)` instead of the raw serial frame
    pub reencode: bool,
    /// `None` disables the status beacon
    pub beacon_interval: Option<Duration>,
    /// Log stats every N serial frames (0 = only at shutdown)
    pub stats_interval_frames: u64,
    pub read_buffer_size: usize,
    /// Upper bound on a single serial wait before re-checking the running flag
    pub poll_interval: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            reencode: false,
            beacon_interval: Some(Duration::from_secs(5)),
            stats_interval_frames: 1000,
            read_buffer_size: 256,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Network side of the relay; either transport may be absent
#[derive(Clone, Default)]
pub struct Transports {
    pub radio: Option<Arc<dyn Transport>>,
    pub mesh: Option<Arc<dyn Transport>>,
}

impl Transports {
    pub fn get(&self, kind: TransportKind) -> Option<&Arc<dyn Transport>> {
        match kind {
            TransportKind::Radio => self.radio.as_ref(),
            TransportKind::Mesh => self.mesh.as_ref(),
            TransportKind::Serial => None,
        }
    }
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transports")
            .field("radio", &self.radio.is_some())
            .field("mesh", &self.mesh.is_some())
            .finish()
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send `data` to every endpoint in `state`
///
/// A failing peer is logged with its address and the current layer and does
/// not stop delivery to the rest. No retries: the next message is the next
/// attempt.
pub async fn fan_out(transports: &Transports, state: &LinkState, data: &[u8]) -> FanoutReport {
    let mut report = FanoutReport::default();

    for endpoint in &state.endpoints {
        let Some(transport) = transports.get(endpoint.transport) else {
            warn!(
                "{} for peer {}",
                RelayError::TransportUnavailable(endpoint.transport),
                endpoint.peer
            );
            report.failed += 1;
            continue;
        };

        match transport.send(&endpoint.peer, data).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!(
                    "Send to {} failed (layer {}): {}",
                    endpoint.peer, state.layer, e
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Relay wiring, ready to be split into its two tasks
pub struct Relay {
    profile: Profile,
    options: RelayOptions,
    transports: Transports,
    link: LinkWatch,
    stats: Arc<RelayStats>,
    sink: Option<TelemetrySink>,
}

impl Relay {
    pub fn new(profile: Profile, options: RelayOptions, transports: Transports, link: LinkWatch) -> Self {
        Self {
            profile,
            options,
            transports,
            link,
            stats: Arc::new(RelayStats::new()),
            sink: None,
        }
    }

    /// Also hand every decoded record to the telemetry log
    pub fn with_telemetry(mut self, sink: TelemetrySink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    pub fn uplink<R: SerialRead>(&self, serial: R) -> Uplink<R> {
        Uplink::new(
            serial,
            self.profile,
            self.options.clone(),
            self.transports.clone(),
            self.link.clone(),
            Arc::clone(&self.stats),
            self.sink.clone(),
        )
    }

    pub fn downlink<W: SerialPortIO>(&self, serial: W) -> Downlink<W> {
        Downlink::new(
            serial,
            self.profile,
            self.options.reencode,
            self.options.beacon_interval,
            self.transports.clone(),
            self.link.clone(),
            Arc::clone(&self.stats),
            self.sink.clone(),
        )
    }

    /// Spawn both directions
    pub fn spawn<R, W>(self, serial_rx: R, serial_tx: W) -> RelayHandle
    where
        R: SerialRead + 'static,
        W: SerialPortIO + 'static,
    {
        info!("Starting {} relay", self.profile);

        let uplink = self.uplink(serial_rx);
        let downlink = self.downlink(serial_tx);

        RelayHandle {
            uplink: tokio::spawn(uplink.run()),
            downlink: tokio::spawn(downlink.run()),
            stats: self.stats,
        }
    }
}

/// Running relay tasks
pub struct RelayHandle {
    uplink: JoinHandle<Result<()>>,
    downlink: JoinHandle<Result<()>>,
    stats: Arc<RelayStats>,
}

impl RelayHandle {
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for both tasks
    ///
    /// # Errors
    ///
    /// The first error either task returned
    pub async fn join(self) -> Result<()> {
        let (uplink, downlink) = tokio::join!(self.uplink, self.downlink);
        let mut first_error = None;

        for (name, outcome) in [("uplink", uplink), ("downlink", downlink)] {
            match outcome {
                Ok(Ok(())) => info!("{} task finished", name),
                Ok(Err(e)) => {
                    error!("{} task failed: {}", name, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => error!("{} task aborted: {}", name, e),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::monitor::{ConnectivityMonitor, LinkEvent, RelayEndpoint};
    use crate::transport::{MockTransport, PeerAddr};
    use mockall::predicate::eq;

    fn peer(port: u16) -> PeerAddr {
        format!("10.0.0.{}:{}", port % 250, port).parse().unwrap()
    }

    fn mesh_state(peers: &[PeerAddr]) -> LinkState {
        LinkState {
            connected: true,
            layer: 2,
            endpoints: peers
                .iter()
                .map(|p| RelayEndpoint::new(TransportKind::Mesh, *p))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_survives_one_failing_peer() {
        let peers = [peer(1), peer(2), peer(3)];
        let mut mesh = MockTransport::new();

        mesh.expect_send()
            .with(eq(peers[0]), eq(vec![0xAB_u8]))
            .times(1)
            .returning(|_, _| Ok(()));
        mesh.expect_send()
            .with(eq(peers[1]), eq(vec![0xAB_u8]))
            .times(1)
            .returning(|p, _| {
                Err(RelayError::TransportSendFailed {
                    transport: TransportKind::Mesh,
                    peer: p.to_string(),
                    reason: "no route".to_string(),
                })
            });
        mesh.expect_send()
            .with(eq(peers[2]), eq(vec![0xAB_u8]))
            .times(1)
            .returning(|_, _| Ok(()));

        let transports = Transports {
            radio: None,
            mesh: Some(Arc::new(mesh)),
        };

        let report = fan_out(&transports, &mesh_state(&peers), &[0xAB]).await;
        assert_eq!(report, FanoutReport { sent: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_fan_out_missing_transport_counts_as_failure() {
        let state = LinkState {
            connected: true,
            layer: 1,
            endpoints: vec![RelayEndpoint::new(TransportKind::Radio, peer(7))],
        };

        let report = fan_out(&Transports::default(), &state, &[1, 2, 3]).await;
        assert_eq!(report, FanoutReport { sent: 0, failed: 1 });
    }

    #[test]
    fn test_transports_lookup() {
        let transports = Transports {
            radio: None,
            mesh: Some(Arc::new(MockTransport::new())),
        };
        assert!(transports.get(TransportKind::Mesh).is_some());
        assert!(transports.get(TransportKind::Radio).is_none());
        assert!(transports.get(TransportKind::Serial).is_none());
    }

    #[tokio::test]
    async fn test_join_reports_uplink_failure() {
        let monitor = ConnectivityMonitor::new();
        monitor.handle(LinkEvent::ParentConnected { layer: 1 });

        let relay = Relay::new(
            Profile::Custom,
            RelayOptions {
                beacon_interval: None,
                ..RelayOptions::default()
            },
            Transports::default(),
            monitor.watch(),
        );

        // Serial closes immediately; the uplink fails, the downlink waits
        // for shutdown
        let (serial_end, fc_end) = tokio::io::duplex(64);
        drop(fc_end);
        let (rx, tx) = tokio::io::split(serial_end);
        let handle = relay.spawn(
            crate::serial::port_trait::TokioSerialPort::new(rx),
            crate::serial::port_trait::TokioSerialPort::new(tx),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.shutdown();

        match tokio::time::timeout(Duration::from_secs(1), handle.join()).await {
            Ok(Err(RelayError::TransportClosed(TransportKind::Serial))) => {}
            other => panic!("Expected serial TransportClosed, got: {:?}", other),
        }
    }
}
