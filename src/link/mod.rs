//! # Link Management
//!
//! Connectivity state shared with the relay tasks and the status beacon
//! sent to peers while connected.

pub mod monitor;
pub mod beacon;
