//! # Telemetry Record Decoder
//!
//! Best-effort decoding of wire packets. Short or corrupted captures still
//! surface whatever leading fields are intact; the caller decides whether
//! to trust a record flagged as failing integrity.

use bytes::Buf;
use tracing::{debug, warn};

use super::checksum::checksum;
use super::record::*;
use crate::error::{RelayError, Result};

/// Outcome of the checksum comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    Valid,
    ChecksumMismatch { received: u16, computed: u16 },
}

/// A decoded record plus what the decoder noticed about it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedRecord {
    pub record: TelemetryRecord,
    pub integrity: Integrity,
    /// Fewer than [`PACKET_SIZE`] bytes were supplied; trailing fields are zero
    pub truncated: bool,
    /// `format_version` matched [`FORMAT_VERSION`] (after zero substitution)
    pub known_version: bool,
}

impl DecodedRecord {
    pub fn is_intact(&self) -> bool {
        self.integrity == Integrity::Valid
    }

    /// Strict view: the record only if its checksum matched
    ///
    /// # Errors
    ///
    /// `ChecksumMismatch` when the embedded checksum disagrees with the payload
    pub fn verified(self) -> Result<TelemetryRecord> {
        match self.integrity {
            Integrity::Valid => Ok(self.record),
            Integrity::ChecksumMismatch { received, computed } => {
                Err(RelayError::ChecksumMismatch { received, computed })
            }
        }
    }
}

/// Decode a wire packet
///
/// Buffers of at least [`PACKET_SIZE`] bytes decode the full payload and read
/// the checksum at offset 65; anything past 67 bytes is ignored. Shorter
/// buffers (down to [`MIN_PACKET_SIZE`]) decode the available prefix,
/// zero-fill the rest, and read the checksum from the last two bytes.
///
/// A checksum mismatch does not fail the decode: the received checksum is
/// stored on the record and `integrity` reports the mismatch. A zero
/// `format_version` is replaced with [`FORMAT_VERSION`].
///
/// # Errors
///
/// `BufferTooSmall` if `data` is shorter than [`MIN_PACKET_SIZE`]
pub fn decode(data: &[u8]) -> Result<DecodedRecord> {
    if data.len() < MIN_PACKET_SIZE {
        return Err(RelayError::BufferTooSmall {
            needed: MIN_PACKET_SIZE,
            available: data.len(),
        });
    }

    let truncated = data.len() < PACKET_SIZE;
    if truncated {
        warn!(
            "Short packet: {} < {} bytes, decoding partially",
            data.len(),
            PACKET_SIZE
        );
    }

    let payload_len = (data.len() - CHECKSUM_SIZE).min(PAYLOAD_SIZE);
    let mut payload = [0u8; PAYLOAD_SIZE];
    payload[..payload_len].copy_from_slice(&data[..payload_len]);

    let received = u16::from_be_bytes([data[payload_len], data[payload_len + 1]]);
    let computed = checksum(&data[..payload_len]);

    let integrity = if received == computed {
        Integrity::Valid
    } else {
        warn!(
            "Checksum mismatch: received 0x{:04X}, computed 0x{:04X}",
            received, computed
        );
        debug!(
            "Packet head: {:02X?}",
            &data[..data.len().min(16)]
        );
        Integrity::ChecksumMismatch { received, computed }
    };

    let mut record = read_payload(&payload);
    record.checksum = received;

    if record.format_version == 0 {
        record.format_version = FORMAT_VERSION;
    }
    let known_version = record.format_version == FORMAT_VERSION;
    if !known_version {
        warn!(
            "Unknown format version {} (expected {}), accepting",
            record.format_version, FORMAT_VERSION
        );
    }

    debug!(
        "Decoded {} id={} ({} bytes, intact={})",
        record.msg_type,
        record.msg_id,
        data.len(),
        integrity == Integrity::Valid
    );

    Ok(DecodedRecord {
        record,
        integrity,
        truncated,
        known_version,
    })
}

fn read_payload(payload: &[u8; PAYLOAD_SIZE]) -> TelemetryRecord {
    let mut src = &payload[..];

    TelemetryRecord {
        msg_type: MsgType::from_u8(src.get_u8()),
        msg_id: src.get_u8(),
        timestamp_ms: src.get_u32_le(),
        latitude: src.get_f32_le(),
        longitude: src.get_f32_le(),
        altitude: src.get_f32_le(),
        relative_altitude: src.get_f32_le(),
        roll: src.get_f32_le(),
        pitch: src.get_f32_le(),
        yaw: src.get_f32_le(),
        vx: src.get_f32_le(),
        vy: src.get_f32_le(),
        vz: src.get_f32_le(),
        battery_percent: src.get_u8(),
        battery_voltage: src.get_f32_le(),
        battery_current: src.get_f32_le(),
        flight_time_s: src.get_u16_le(),
        status_flags: StatusFlags(src.get_u16_le()),
        cpu_load_percent: src.get_u8(),
        signal_strength_percent: src.get_u8(),
        satellite_count: src.get_u8(),
        gps_fix_type: GpsFixType::from_u8(src.get_u8()),
        format_version: src.get_u8(),
        reserved: src.get_u8(),
        checksum: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::encoder::encode_to_vec;

    fn sample_record() -> TelemetryRecord {
        TelemetryRecord {
            msg_type: MsgType::Alert,
            msg_id: 42,
            timestamp_ms: 123_456,
            latitude: 55.7558,
            longitude: 37.6173,
            altitude: 152.5,
            relative_altitude: 12.25,
            roll: -3.5,
            pitch: 1.75,
            yaw: 270.0,
            vx: 4.0,
            vy: -0.5,
            vz: 0.25,
            battery_percent: 76,
            battery_voltage: 11.8,
            battery_current: 14.2,
            flight_time_s: 615,
            status_flags: StatusFlags::ARMED | StatusFlags::FLYING | StatusFlags::GPS_FIX,
            cpu_load_percent: 37,
            signal_strength_percent: 88,
            satellite_count: 14,
            gps_fix_type: GpsFixType::Fix3D,
            format_version: FORMAT_VERSION,
            reserved: 0,
            checksum: 0,
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let record = sample_record();
        let packet = encode_to_vec(&record);

        let decoded = decode(&packet).unwrap();
        assert!(decoded.is_intact());
        assert!(!decoded.truncated);
        assert!(decoded.known_version);

        let mut expected = record;
        expected.checksum = u16::from_be_bytes([packet[65], packet[66]]);
        assert_eq!(decoded.record, expected);
    }

    #[test]
    fn test_single_byte_flip_is_detected() {
        let packet = encode_to_vec(&sample_record());

        for index in 0..PAYLOAD_SIZE {
            let mut corrupted = packet.clone();
            corrupted[index] ^= 0x01;

            let decoded = decode(&corrupted).unwrap();
            assert!(
                !decoded.is_intact(),
                "Flip at byte {} went unnoticed",
                index
            );
        }
    }

    #[test]
    fn test_mismatch_still_returns_record() {
        let mut packet = encode_to_vec(&sample_record());
        packet[66] ^= 0xFF;

        let decoded = decode(&packet).unwrap();
        assert_eq!(decoded.record.msg_id, 42);
        assert_eq!(decoded.record.battery_percent, 76);
        assert_eq!(
            decoded.record.checksum,
            u16::from_be_bytes([packet[65], packet[66]])
        );
        match decoded.integrity {
            Integrity::ChecksumMismatch { received, computed } => {
                assert_ne!(received, computed);
            }
            Integrity::Valid => panic!("Expected checksum mismatch"),
        }

        match decoded.verified() {
            Err(RelayError::ChecksumMismatch { .. }) => {}
            other => panic!("Expected ChecksumMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_below_floor_fails() {
        for len in [0, 1, 11] {
            let data = vec![0x01u8; len];
            match decode(&data) {
                Err(RelayError::BufferTooSmall { needed, available }) => {
                    assert_eq!(needed, 12);
                    assert_eq!(available, len);
                }
                other => panic!("Expected BufferTooSmall for {} bytes, got: {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_truncated_decode_zero_fills_tail() {
        let packet = encode_to_vec(&sample_record());

        // 10 payload bytes followed by two bytes that are not their checksum
        let mut short = packet[..12].to_vec();
        let decoded = decode(&short).unwrap();

        assert!(decoded.truncated);
        assert_eq!(decoded.record.msg_type, MsgType::Alert);
        assert_eq!(decoded.record.msg_id, 42);
        assert_eq!(decoded.record.timestamp_ms, 123_456);
        assert!((decoded.record.latitude - 55.7558).abs() < 1e-4);
        assert_eq!(decoded.record.longitude, 0.0);
        assert_eq!(decoded.record.battery_percent, 0);
        assert_eq!(decoded.record.gps_fix_type, GpsFixType::NoFix);
        // Version byte was never seen, so the current version is substituted
        assert_eq!(decoded.record.format_version, FORMAT_VERSION);
        assert_eq!(
            decoded.record.checksum,
            u16::from_be_bytes([short[10], short[11]])
        );
        assert!(!decoded.is_intact());

        // Same prefix with a checksum that matches the truncated payload
        let sum = checksum(&short[..10]);
        short[10..12].copy_from_slice(&sum.to_be_bytes());
        let decoded = decode(&short).unwrap();
        assert!(decoded.truncated);
        assert!(decoded.is_intact());
    }

    #[test]
    fn test_oversized_buffer_ignores_trailing_bytes() {
        let mut packet = encode_to_vec(&sample_record());
        packet.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let decoded = decode(&packet).unwrap();
        assert!(decoded.is_intact());
        assert!(!decoded.truncated);
        assert_eq!(decoded.record.msg_id, 42);
    }

    #[test]
    fn test_zero_version_is_substituted() {
        let mut packet = encode_to_vec(&sample_record());
        packet[OFFSET_FORMAT_VERSION] = 0;
        let sum = checksum(&packet[..PAYLOAD_SIZE]);
        packet[65..67].copy_from_slice(&sum.to_be_bytes());

        let decoded = decode(&packet).unwrap();
        assert!(decoded.is_intact());
        assert!(decoded.known_version);
        assert_eq!(decoded.record.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_unknown_version_is_flagged_not_rejected() {
        let mut packet = encode_to_vec(&sample_record());
        packet[OFFSET_FORMAT_VERSION] = 9;
        let sum = checksum(&packet[..PAYLOAD_SIZE]);
        packet[65..67].copy_from_slice(&sum.to_be_bytes());

        let decoded = decode(&packet).unwrap();
        assert!(decoded.is_intact());
        assert!(!decoded.known_version);
        assert_eq!(decoded.record.format_version, 9);
    }
}
