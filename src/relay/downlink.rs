//! Network -> flight controller direction, plus the status beacon

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::profile::Profile;
use super::stats::RelayStats;
use super::{fan_out, Transports};
use crate::error::{RelayError, Result};
use crate::link::beacon::{is_beacon, Beacon};
use crate::link::monitor::LinkWatch;
use crate::serial::port_trait::SerialPortIO;
use crate::serial::SerialWriter;
use crate::telemetry::TelemetrySink;
use crate::transport::{Datagram, Transport, TransportKind};

/// Minimum datagram buffer per inbound transport; larger when the
/// transport's payload limit is larger
const RECV_BUFFER_SIZE: usize = 2048;

/// What woke the downlink loop
enum Wake {
    Stop,
    Received(TransportKind, Result<Datagram>),
    BeaconTick,
}

/// Network-to-serial task
///
/// Owns the serial write half and one receive buffer per transport.
/// Inbound records go through the same inspection as the uplink before
/// they are written.
pub struct Downlink<W: SerialPortIO> {
    serial: SerialWriter<W>,
    profile: Profile,
    reencode: bool,
    transports: Transports,
    link: LinkWatch,
    stats: Arc<RelayStats>,
    sink: Option<TelemetrySink>,
    beacon: Beacon,
    beacon_interval: Option<Duration>,
    radio_buf: Vec<u8>,
    mesh_buf: Vec<u8>,
}

impl<W: SerialPortIO> Downlink<W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        serial: W,
        profile: Profile,
        reencode: bool,
        beacon_interval: Option<Duration>,
        transports: Transports,
        link: LinkWatch,
        stats: Arc<RelayStats>,
        sink: Option<TelemetrySink>,
    ) -> Self {
        Self {
            serial: SerialWriter::new(serial),
            profile,
            reencode,
            link,
            stats,
            sink,
            beacon: Beacon::new(),
            beacon_interval,
            radio_buf: recv_buffer(transports.radio.as_deref()),
            mesh_buf: recv_buffer(transports.mesh.as_deref()),
            transports,
        }
    }

    /// Run until shutdown or until every inbound transport has closed
    ///
    /// Serial write failures are logged and the datagram is lost; the flight
    /// controller is assumed to come back.
    pub async fn run(mut self) -> Result<()> {
        info!("Downlink started");

        let mut radio_open = self.transports.radio.is_some();
        let mut mesh_open = self.transports.mesh.is_some();
        let had_transports = radio_open || mesh_open;

        let mut ticker = self.beacon_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        while self.link.is_running() {
            if had_transports && !radio_open && !mesh_open {
                warn!("All inbound transports closed");
                break;
            }

            let radio = self.transports.radio.as_deref().filter(|_| radio_open);
            let mesh = self.transports.mesh.as_deref().filter(|_| mesh_open);

            let wake = tokio::select! {
                _ = self.link.stopped() => Wake::Stop,
                received = recv_from(radio, &mut self.radio_buf) => {
                    Wake::Received(TransportKind::Radio, received)
                }
                received = recv_from(mesh, &mut self.mesh_buf) => {
                    Wake::Received(TransportKind::Mesh, received)
                }
                _ = next_tick(&mut ticker) => Wake::BeaconTick,
            };

            match wake {
                Wake::Stop => break,
                Wake::BeaconTick => self.send_beacon().await,
                Wake::Received(kind, Ok(datagram)) => self.deliver(kind, datagram).await,
                Wake::Received(kind, Err(RelayError::TransportClosed(_))) => {
                    warn!("{} transport closed", kind);
                    match kind {
                        TransportKind::Radio => radio_open = false,
                        _ => mesh_open = false,
                    }
                }
                Wake::Received(kind, Err(e)) => warn!("{} receive failed: {}", kind, e),
            }
        }

        info!("Downlink stopped");
        Ok(())
    }

    async fn deliver(&mut self, kind: TransportKind, datagram: Datagram) {
        let buf = match kind {
            TransportKind::Radio => &self.radio_buf,
            _ => &self.mesh_buf,
        };
        let data = &buf[..datagram.len];

        if is_beacon(data) {
            debug!("Beacon from {} over {}: {:02X?}", datagram.from, kind, data);
            return;
        }

        debug!(
            "{} bytes from {} over {} -> serial",
            datagram.len, datagram.from, kind
        );
        let payload = self.profile.inspect(
            Bytes::copy_from_slice(data),
            self.reencode,
            self.sink.as_ref(),
            &self.stats,
        );
        let framed = self.profile.wrap_serial(&payload);

        match self.serial.send_packet(&framed).await {
            Ok(()) => RelayStats::bump(&self.stats.downlink_frames),
            Err(e) => warn!("Dropping datagram from {}: {}", datagram.from, e),
        }
    }

    async fn send_beacon(&mut self) {
        let state = self.link.snapshot();
        for message in self.beacon.tick(state.can_forward()) {
            let report = fan_out(&self.transports, &state, &message).await;
            debug!(
                "Beacon {:02X?} sent to {} peer(s), {} failed",
                message, report.sent, report.failed
            );
        }
    }
}

fn recv_buffer(transport: Option<&dyn Transport>) -> Vec<u8> {
    match transport {
        Some(transport) => vec![0u8; transport.max_payload().max(RECV_BUFFER_SIZE)],
        None => Vec::new(),
    }
}

/// Receive from `transport`, or wait forever if there is none
async fn recv_from(transport: Option<&dyn Transport>, buf: &mut [u8]) -> Result<Datagram> {
    match transport {
        Some(transport) => transport.recv(buf).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
