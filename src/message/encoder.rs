//! # Telemetry Record Encoder
//!
//! Serializes a [`TelemetryRecord`] into the 67-byte wire packet.

use bytes::BufMut;

use super::checksum::checksum;
use super::record::*;
use crate::error::{RelayError, Result};

/// Encode a record into a caller-provided buffer
///
/// Writes the 65-byte payload in wire order, then the big-endian checksum
/// of those 65 bytes. `format_version` is forced to [`FORMAT_VERSION`] and
/// `reserved` to zero regardless of what the record holds.
///
/// # Returns
///
/// * `Result<usize>` - Number of bytes written (always [`PACKET_SIZE`])
///
/// # Errors
///
/// `BufferTooSmall` if `buffer` is shorter than [`PACKET_SIZE`]
pub fn encode(record: &TelemetryRecord, buffer: &mut [u8]) -> Result<usize> {
    if buffer.len() < PACKET_SIZE {
        return Err(RelayError::BufferTooSmall {
            needed: PACKET_SIZE,
            available: buffer.len(),
        });
    }

    write_packet(record, &mut buffer[..PACKET_SIZE]);
    Ok(PACKET_SIZE)
}

/// Encode a record into a freshly allocated packet
///
/// # Examples
///
/// ```
/// use uav_relay::message::encoder::encode_to_vec;
/// use uav_relay::message::record::TelemetryRecord;
///
/// let packet = encode_to_vec(&TelemetryRecord::default());
/// assert_eq!(packet.len(), 67);
/// ```
pub fn encode_to_vec(record: &TelemetryRecord) -> Vec<u8> {
    let mut packet = vec![0u8; PACKET_SIZE];
    write_packet(record, &mut packet);
    packet
}

/// `packet` must be exactly [`PACKET_SIZE`] bytes
fn write_packet(record: &TelemetryRecord, packet: &mut [u8]) {
    {
        let mut dst = &mut packet[..PAYLOAD_SIZE];
        put_payload(record, &mut dst);
    }

    let sum = checksum(&packet[..PAYLOAD_SIZE]);
    packet[OFFSET_CHECKSUM..PACKET_SIZE].copy_from_slice(&sum.to_be_bytes());
}

fn put_payload<B: BufMut>(record: &TelemetryRecord, dst: &mut B) {
    dst.put_u8(record.msg_type.as_u8());
    dst.put_u8(record.msg_id);
    dst.put_u32_le(record.timestamp_ms);

    dst.put_f32_le(record.latitude);
    dst.put_f32_le(record.longitude);
    dst.put_f32_le(record.altitude);
    dst.put_f32_le(record.relative_altitude);

    dst.put_f32_le(record.roll);
    dst.put_f32_le(record.pitch);
    dst.put_f32_le(record.yaw);

    dst.put_f32_le(record.vx);
    dst.put_f32_le(record.vy);
    dst.put_f32_le(record.vz);

    dst.put_u8(record.battery_percent);
    dst.put_f32_le(record.battery_voltage);
    dst.put_f32_le(record.battery_current);

    dst.put_u16_le(record.flight_time_s);
    dst.put_u16_le(record.status_flags.bits());

    dst.put_u8(record.cpu_load_percent);
    dst.put_u8(record.signal_strength_percent);
    dst.put_u8(record.satellite_count);
    dst.put_u8(record.gps_fix_type.as_u8());

    dst.put_u8(FORMAT_VERSION);
    dst.put_u8(0); // reserved
}
