//! # UAV Relay Library
//!
//! Relay drone telemetry and commands between a flight controller on a
//! serial link and a point-to-point radio and/or a multi-hop mesh.
//!
//! This library provides the 67-byte telemetry record codec, the serial
//! framers (start/end markers or MAVLink), the network transports, the
//! connectivity monitor, and the two-direction relay built on them.

pub mod config;
pub mod error;
pub mod framing;
pub mod link;
pub mod message;
pub mod relay;
pub mod serial;
pub mod telemetry;
pub mod transport;
