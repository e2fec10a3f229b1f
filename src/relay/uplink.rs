//! Flight controller -> network direction

use bytes::Bytes;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::profile::Profile;
use super::stats::RelayStats;
use super::{fan_out, FanoutReport, RelayOptions, Transports};
use crate::error::{RelayError, Result};
use crate::framing::{frames, FrameSource};
use crate::link::monitor::LinkWatch;
use crate::serial::port_trait::SerialRead;
use crate::telemetry::TelemetrySink;
use crate::transport::TransportKind;

/// Serial-to-network task
///
/// Owns the serial read half, its read buffer and the framer state.
pub struct Uplink<R: SerialRead> {
    serial: R,
    framer: Box<dyn FrameSource>,
    profile: Profile,
    options: RelayOptions,
    transports: Transports,
    link: LinkWatch,
    stats: Arc<RelayStats>,
    sink: Option<TelemetrySink>,
    read_buf: Vec<u8>,
}

impl<R: SerialRead> Uplink<R> {
    pub fn new(
        serial: R,
        profile: Profile,
        options: RelayOptions,
        transports: Transports,
        link: LinkWatch,
        stats: Arc<RelayStats>,
        sink: Option<TelemetrySink>,
    ) -> Self {
        Self {
            serial,
            framer: profile.frame_source(options.frame_capacity),
            read_buf: vec![0u8; options.read_buffer_size.max(1)],
            profile,
            options,
            transports,
            link,
            stats,
            sink,
        }
    }

    /// Run until shutdown or serial EOF
    ///
    /// # Errors
    ///
    /// `TransportClosed(Serial)` when the port reaches EOF, `Serial` on a
    /// read failure
    pub async fn run(mut self) -> Result<()> {
        info!("Uplink started ({} profile)", self.profile);

        while self.link.is_running() {
            let read = tokio::select! {
                _ = self.link.stopped() => break,
                read = timeout(self.options.poll_interval, self.serial.read_chunk(&mut self.read_buf)) => read,
            };

            let n = match read {
                // Nothing arrived this poll; re-check the running flag
                Err(_elapsed) => continue,
                Ok(Ok(0)) => {
                    warn!("Serial port closed");
                    return Err(RelayError::TransportClosed(TransportKind::Serial));
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(RelayError::Serial(format!("Failed to read serial port: {}", e)));
                }
            };

            self.process_chunk(n).await;
        }

        info!("Uplink stopped");
        Ok(())
    }

    async fn process_chunk(&mut self, n: usize) {
        let mut completed: Vec<Bytes> = Vec::new();
        for frame in frames(self.framer.as_mut(), &self.read_buf[..n]) {
            match frame {
                Ok(frame) => completed.push(frame),
                Err(_) => RelayStats::bump(&self.stats.oversize_frames),
            }
        }

        for frame in completed {
            RelayStats::bump(&self.stats.frames_in);
            let outbound =
                self.profile
                    .inspect(frame, self.options.reencode, self.sink.as_ref(), &self.stats);
            self.forward(&outbound).await;

            let interval = self.options.stats_interval_frames;
            if interval > 0 && self.stats.frames_in.load(std::sync::atomic::Ordering::Relaxed) % interval == 0 {
                self.stats.log();
            }
        }
    }

    /// Fan one frame out to the current endpoints, or drop it when there is
    /// no usable link
    async fn forward(&mut self, frame: &[u8]) -> FanoutReport {
        let state = self.link.snapshot();
        if !state.can_forward() {
            debug!(
                "No usable link (connected={}, {} endpoints), dropping {} byte frame",
                state.connected,
                state.endpoints.len(),
                frame.len()
            );
            RelayStats::bump(&self.stats.dropped);
            return FanoutReport::default();
        }

        let report = fan_out(&self.transports, &state, frame).await;
        if report.sent > 0 {
            RelayStats::bump(&self.stats.forwarded);
        }
        RelayStats::add(&self.stats.send_failures, report.failed as u64);
        report
    }
}
