//! # Telemetry Record Types and Wire Constants
//!
//! The fixed-layout drone message shared with the flight controller and
//! ground nodes. Field order and widths are a wire contract: both ends must
//! agree byte-for-byte, so every offset is spelled out here.

use serde::Serialize;
use std::fmt;

/// Current message format version written by the encoder
pub const FORMAT_VERSION: u8 = 1;

/// Serialized payload size (every field except the checksum)
pub const PAYLOAD_SIZE: usize = 65;

/// Checksum size in bytes (big-endian on the wire)
pub const CHECKSUM_SIZE: usize = 2;

/// Full packet size: payload + checksum
pub const PACKET_SIZE: usize = PAYLOAD_SIZE + CHECKSUM_SIZE;

/// Smallest payload prefix the decoder will attempt
pub const MIN_PAYLOAD_SIZE: usize = 10;

/// Smallest buffer the decoder accepts (minimum payload + checksum)
pub const MIN_PACKET_SIZE: usize = MIN_PAYLOAD_SIZE + CHECKSUM_SIZE;

// Field offsets inside the payload. Multi-byte integers and floats are
// little-endian, packed with no padding.
pub const OFFSET_MSG_TYPE: usize = 0;
pub const OFFSET_MSG_ID: usize = 1;
pub const OFFSET_TIMESTAMP: usize = 2;
pub const OFFSET_LATITUDE: usize = 6;
pub const OFFSET_LONGITUDE: usize = 10;
pub const OFFSET_ALTITUDE: usize = 14;
pub const OFFSET_RELATIVE_ALTITUDE: usize = 18;
pub const OFFSET_ROLL: usize = 22;
pub const OFFSET_PITCH: usize = 26;
pub const OFFSET_YAW: usize = 30;
pub const OFFSET_VX: usize = 34;
pub const OFFSET_VY: usize = 38;
pub const OFFSET_VZ: usize = 42;
pub const OFFSET_BATTERY_PERCENT: usize = 46;
pub const OFFSET_BATTERY_VOLTAGE: usize = 47;
pub const OFFSET_BATTERY_CURRENT: usize = 51;
pub const OFFSET_FLIGHT_TIME: usize = 55;
pub const OFFSET_STATUS_FLAGS: usize = 57;
pub const OFFSET_CPU_LOAD: usize = 59;
pub const OFFSET_SIGNAL_STRENGTH: usize = 60;
pub const OFFSET_SATELLITES: usize = 61;
pub const OFFSET_GPS_FIX: usize = 62;
pub const OFFSET_FORMAT_VERSION: usize = 63;
pub const OFFSET_RESERVED: usize = 64;
pub const OFFSET_CHECKSUM: usize = 65;

/// Message type carried in byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MsgType {
    Telemetry,
    Command,
    Ack,
    Alert,
    /// Any byte outside the known set, kept so the record re-encodes verbatim
    Other(u8),
}

impl MsgType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => MsgType::Telemetry,
            0x02 => MsgType::Command,
            0x03 => MsgType::Ack,
            0x04 => MsgType::Alert,
            other => MsgType::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MsgType::Telemetry => 0x01,
            MsgType::Command => 0x02,
            MsgType::Ack => 0x03,
            MsgType::Alert => 0x04,
            MsgType::Other(value) => value,
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgType::Telemetry => write!(f, "TELEMETRY"),
            MsgType::Command => write!(f, "COMMAND"),
            MsgType::Ack => write!(f, "ACK"),
            MsgType::Alert => write!(f, "ALERT"),
            MsgType::Other(value) => write!(f, "UNKNOWN(0x{:02X})", value),
        }
    }
}

/// GPS fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GpsFixType {
    NoFix,
    Fix2D,
    Fix3D,
    Other(u8),
}

impl GpsFixType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => GpsFixType::NoFix,
            1 => GpsFixType::Fix2D,
            2 => GpsFixType::Fix3D,
            other => GpsFixType::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            GpsFixType::NoFix => 0,
            GpsFixType::Fix2D => 1,
            GpsFixType::Fix3D => 2,
            GpsFixType::Other(value) => value,
        }
    }
}

/// Drone status bitset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusFlags(pub u16);

impl StatusFlags {
    pub const ARMED: StatusFlags = StatusFlags(1 << 0);
    pub const FLYING: StatusFlags = StatusFlags(1 << 1);
    pub const GPS_FIX: StatusFlags = StatusFlags(1 << 2);
    pub const LOW_BATTERY: StatusFlags = StatusFlags(1 << 3);
    pub const RETURN_TO_HOME: StatusFlags = StatusFlags(1 << 4);
    pub const FAILSAFE: StatusFlags = StatusFlags(1 << 5);
    pub const CALIBRATING: StatusFlags = StatusFlags(1 << 6);
    pub const ERROR: StatusFlags = StatusFlags(1 << 7);

    const NAMED: [(StatusFlags, &'static str); 8] = [
        (Self::ARMED, "armed"),
        (Self::FLYING, "flying"),
        (Self::GPS_FIX, "gps_fix"),
        (Self::LOW_BATTERY, "low_battery"),
        (Self::RETURN_TO_HOME, "return_to_home"),
        (Self::FAILSAFE, "failsafe"),
        (Self::CALIBRATING, "calibrating"),
        (Self::ERROR, "error"),
    ];

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: StatusFlags) {
        self.0 |= other.0;
    }

    /// Names of the set flags, in bit order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlags) -> StatusFlags {
        StatusFlags(self.0 | rhs.0)
    }
}

/// One drone message
///
/// Constructed fresh per message, either by decoding inbound bytes or from
/// [`TelemetryRecord::default`] plus locally sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub msg_type: MsgType,
    /// Sequence / ack correlation id
    pub msg_id: u8,
    /// Milliseconds since device boot
    pub timestamp_ms: u32,

    /// Latitude in degrees
    pub latitude: f32,
    /// Longitude in degrees
    pub longitude: f32,
    /// Altitude in meters
    pub altitude: f32,
    /// Altitude above the takeoff point in meters
    pub relative_altitude: f32,

    /// Roll in degrees
    pub roll: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Yaw in degrees
    pub yaw: f32,

    /// Velocity in m/s
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,

    /// Battery remaining (0-100%)
    pub battery_percent: u8,
    /// Battery voltage in volts
    pub battery_voltage: f32,
    /// Current draw in amperes
    pub battery_current: f32,

    /// Flight time in seconds
    pub flight_time_s: u16,
    pub status_flags: StatusFlags,

    pub cpu_load_percent: u8,
    pub signal_strength_percent: u8,
    pub satellite_count: u8,
    pub gps_fix_type: GpsFixType,

    pub format_version: u8,
    pub reserved: u8,
    /// Checksum as received (decode) or last computed (encode)
    pub checksum: u16,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            msg_type: MsgType::Telemetry,
            msg_id: 0,
            timestamp_ms: 0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            relative_altitude: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            battery_percent: 100,
            battery_voltage: 12.6,
            battery_current: 0.0,
            flight_time_s: 0,
            status_flags: StatusFlags::default(),
            cpu_load_percent: 0,
            signal_strength_percent: 99,
            satellite_count: 0,
            gps_fix_type: GpsFixType::NoFix,
            format_version: FORMAT_VERSION,
            reserved: 0,
            checksum: 0,
        }
    }
}
