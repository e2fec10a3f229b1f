//! # MAVLink Packet Parser
//!
//! Self-delimiting profile: MAVLink packets carry their own length, so no
//! outer markers are needed. The parser tracks the header just far enough
//! to know where each packet ends and hands complete packets on unchanged.
//!
//! CRC_EXTRA seeds are dialect specific, so the trailing X.25 checksum is
//! carried through but not verified here; the endpoints check it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use super::FrameSource;
use crate::error::Result;

/// MAVLink v1 start byte
pub const MAVLINK_V1_STX: u8 = 0xFE;

/// MAVLink v2 start byte
pub const MAVLINK_V2_STX: u8 = 0xFD;

/// v1: STX, LEN, SEQ, SYS, COMP, MSGID + CRC(2)
const V1_OVERHEAD: usize = 6 + 2;

/// v2: STX, LEN, INCOMPAT, COMPAT, SEQ, SYS, COMP, MSGID(3) + CRC(2)
const V2_OVERHEAD: usize = 10 + 2;

/// v2 incompat flag: packet is followed by a 13-byte signature
const V2_FLAG_SIGNED: u8 = 0x01;

const V2_SIGNATURE_LEN: usize = 13;

/// Largest possible packet (signed v2 with 255-byte payload)
pub const MAVLINK_MAX_PACKET_LEN: usize = 255 + V2_OVERHEAD + V2_SIGNATURE_LEN;

pub const MSG_ID_HEARTBEAT: u32 = 0;
pub const MSG_ID_ATTITUDE: u32 = 30;
pub const MSG_ID_GLOBAL_POSITION_INT: u32 = 33;

/// Incremental packet extractor
#[derive(Debug)]
pub struct MavlinkParser {
    buffer: BytesMut,
    expected_len: Option<usize>,
}

impl MavlinkParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAVLINK_MAX_PACKET_LEN),
            expected_len: None,
        }
    }

    fn header_complete(&mut self) {
        let magic = self.buffer[0];
        let len = self.buffer[1] as usize;

        self.expected_len = match (magic, self.buffer.len()) {
            (MAVLINK_V1_STX, 2) => Some(len + V1_OVERHEAD),
            (MAVLINK_V2_STX, 3) => {
                let signature = if self.buffer[2] & V2_FLAG_SIGNED != 0 {
                    V2_SIGNATURE_LEN
                } else {
                    0
                };
                Some(len + V2_OVERHEAD + signature)
            }
            _ => None,
        };
    }
}

impl Default for MavlinkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for MavlinkParser {
    fn push_byte(&mut self, byte: u8) -> Result<Option<Bytes>> {
        if self.buffer.is_empty() {
            if byte == MAVLINK_V1_STX || byte == MAVLINK_V2_STX {
                self.buffer.put_u8(byte);
            }
            return Ok(None);
        }

        self.buffer.put_u8(byte);

        if self.expected_len.is_none() {
            self.header_complete();
        }

        match self.expected_len {
            Some(expected) if self.buffer.len() >= expected => {
                self.expected_len = None;
                let packet = self.buffer.split().freeze();
                debug!("MAVLink packet complete ({} bytes)", packet.len());
                Ok(Some(packet))
            }
            _ => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.expected_len = None;
    }
}

/// Header fields of a complete packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MavlinkHeader {
    pub version: u8,
    pub seq: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub msg_id: u32,
}

/// Split a complete packet into header and payload
///
/// Returns `None` for anything that is not a whole v1/v2 packet.
pub fn parse_packet(packet: &[u8]) -> Option<(MavlinkHeader, &[u8])> {
    let magic = *packet.first()?;
    let len = *packet.get(1)? as usize;

    match magic {
        MAVLINK_V1_STX if packet.len() >= len + V1_OVERHEAD => {
            let header = MavlinkHeader {
                version: 1,
                seq: packet[2],
                system_id: packet[3],
                component_id: packet[4],
                msg_id: packet[5] as u32,
            };
            Some((header, &packet[6..6 + len]))
        }
        MAVLINK_V2_STX if packet.len() >= len + V2_OVERHEAD => {
            let header = MavlinkHeader {
                version: 2,
                seq: packet[4],
                system_id: packet[5],
                component_id: packet[6],
                msg_id: u32::from_le_bytes([packet[7], packet[8], packet[9], 0]),
            };
            Some((header, &packet[10..10 + len]))
        }
        _ => None,
    }
}

/// One-line description of a packet for logs
///
/// HEARTBEAT, ATTITUDE and GLOBAL_POSITION_INT payloads are unpacked; other
/// messages are described by id and sequence.
pub fn describe_packet(packet: &[u8]) -> String {
    let Some((header, payload)) = parse_packet(packet) else {
        return format!("non-MAVLink data ({} bytes)", packet.len());
    };

    match header.msg_id {
        MSG_ID_HEARTBEAT => {
            let mut p = zero_extended(payload, 9);
            let _custom_mode = p.get_u32_le();
            let vehicle_type = p.get_u8();
            let autopilot = p.get_u8();
            let base_mode = p.get_u8();
            format!(
                "HEARTBEAT sys={} type={} autopilot={} base_mode={}",
                header.system_id, vehicle_type, autopilot, base_mode
            )
        }
        MSG_ID_ATTITUDE => {
            let mut p = zero_extended(payload, 28);
            let _time_boot_ms = p.get_u32_le();
            let roll = p.get_f32_le().to_degrees();
            let pitch = p.get_f32_le().to_degrees();
            let yaw = p.get_f32_le().to_degrees();
            format!(
                "ATTITUDE sys={} roll={:.2}° pitch={:.2}° yaw={:.2}°",
                header.system_id, roll, pitch, yaw
            )
        }
        MSG_ID_GLOBAL_POSITION_INT => {
            let mut p = zero_extended(payload, 28);
            let _time_boot_ms = p.get_u32_le();
            let lat = p.get_i32_le();
            let lon = p.get_i32_le();
            let alt_mm = p.get_i32_le();
            let relative_alt_mm = p.get_i32_le();
            format!(
                "GLOBAL_POSITION_INT sys={} lat={:.7}° lon={:.7}° alt={} mm rel_alt={} mm",
                header.system_id,
                lat as f64 / 1e7,
                lon as f64 / 1e7,
                alt_mm,
                relative_alt_mm
            )
        }
        other => format!(
            "MAVLink v{} msg {} seq={} sys={} comp={}",
            header.version, other, header.seq, header.system_id, header.component_id
        ),
    }
}

/// v2 trims trailing zero bytes from payloads; restore them before reading
fn zero_extended(payload: &[u8], len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(len.max(payload.len()));
    buf.put_slice(payload);
    if buf.len() < len {
        buf.put_bytes(0, len - buf.len());
    }
    buf.freeze()
}
