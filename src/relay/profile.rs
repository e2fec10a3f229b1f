//! # Wire Profiles
//!
//! The relay speaks one of two serial dialects, chosen at startup:
//! - `custom`: fixed 67-byte records inside `AA 55 ... 55 AA` markers
//! - `mavlink`: self-delimiting MAVLink v1/v2 packets, relayed as-is
//!
//! A profile supplies the framer for the serial stream, inspects each frame
//! on its way to the network, and wraps network payloads for the serial
//! side.

use bytes::Bytes;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

use super::stats::RelayStats;
use crate::framing::marker::{wrap_frame, MarkerFramer};
use crate::framing::mavlink::{describe_packet, MavlinkParser};
use crate::framing::FrameSource;
use crate::message::decoder::{decode, Integrity};
use crate::message::encoder::encode_to_vec;
use crate::telemetry::report::log_record;
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Custom,
    Mavlink,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Custom => write!(f, "custom"),
            Profile::Mavlink => write!(f, "mavlink"),
        }
    }
}

impl Profile {
    /// Fresh serial front-end for this profile
    ///
    /// `capacity` bounds the marker framer's buffer; MAVLink packets carry
    /// their own length and ignore it.
    pub fn frame_source(self, capacity: usize) -> Box<dyn FrameSource> {
        match self {
            Profile::Custom => Box::new(MarkerFramer::new(capacity)),
            Profile::Mavlink => Box::new(MavlinkParser::new()),
        }
    }

    /// Bytes to write to the flight controller for a network payload
    pub fn wrap_serial(self, payload: &[u8]) -> Bytes {
        match self {
            Profile::Custom => wrap_frame(payload),
            Profile::Mavlink => Bytes::copy_from_slice(payload),
        }
    }

    /// Log a serial frame and decide what goes out on the network
    ///
    /// Custom frames are decoded best-effort; a record failing its checksum
    /// is counted and logged but still relayed. With `reencode` set, a
    /// decoded record is sent as `encode(record)` instead of the raw frame.
    /// Frames too short to decode go out unchanged.
    pub fn inspect(
        self,
        frame: Bytes,
        reencode: bool,
        sink: Option<&TelemetrySink>,
        stats: &RelayStats,
    ) -> Bytes {
        match self {
            Profile::Mavlink => {
                debug!("MAVLink {}", describe_packet(&frame));
                frame
            }
            Profile::Custom => match decode(&frame) {
                Ok(decoded) => {
                    if let Integrity::ChecksumMismatch { received, computed } = decoded.integrity {
                        warn!(
                            "Checksum mismatch on {} byte frame (received 0x{:04X}, computed 0x{:04X}), relaying anyway",
                            frame.len(),
                            received,
                            computed
                        );
                        RelayStats::bump(&stats.integrity_failures);
                    }
                    log_record(&decoded.record);

                    if let Some(sink) = sink {
                        sink.submit(&decoded.record, decoded.is_intact());
                    }

                    if reencode {
                        Bytes::from(encode_to_vec(&decoded.record))
                    } else {
                        frame
                    }
                }
                Err(e) => {
                    warn!("Undecodable frame ({} bytes): {}", frame.len(), e);
                    frame
                }
            },
        }
    }
}
