//! # Telemetry Module
//!
//! Diagnostics for the records passing through the relay.
//!
//! This module handles:
//! - Dumping decoded records to the log with plausibility warnings
//! - Formatting records as JSONL (JSON Lines)
//! - Writing to rotating log files off the relay's hot path
//! - Retaining only the last N files

pub mod logger;
pub mod report;

pub use logger::{TelemetryEntry, TelemetryLogger, TelemetrySink};
