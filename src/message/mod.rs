//! # Drone Message Codec
//!
//! Fixed-layout telemetry record exchanged with the flight controller.
//!
//! This module handles:
//! - Record types and the 67-byte wire layout
//! - Encoding with a trailing big-endian additive checksum
//! - Best-effort decoding of full and truncated packets
//! - Integrity flagging instead of rejection on checksum mismatch

pub mod record;
pub mod encoder;
pub mod decoder;
pub mod checksum;
