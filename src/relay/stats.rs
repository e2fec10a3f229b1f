//! Relay counters shared by both directions

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct RelayStats {
    /// Frames extracted from the serial stream
    pub frames_in: AtomicU64,
    /// Serial frames sent to at least one peer
    pub forwarded: AtomicU64,
    /// Serial frames dropped for lack of a usable link
    pub dropped: AtomicU64,
    /// Individual peer sends that failed
    pub send_failures: AtomicU64,
    /// Records whose checksum did not match
    pub integrity_failures: AtomicU64,
    /// Partial frames discarded by the framer
    pub oversize_frames: AtomicU64,
    /// Datagrams written to the flight controller
    pub downlink_frames: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            oversize_frames: self.oversize_frames.load(Ordering::Relaxed),
            downlink_frames: self.downlink_frames.load(Ordering::Relaxed),
        }
    }

    pub fn log(&self) {
        let s = self.snapshot();
        info!(
            "Relay stats: in={} forwarded={} dropped={} send_failures={} integrity_failures={} oversize={} downlink={}",
            s.frames_in,
            s.forwarded,
            s.dropped,
            s.send_failures,
            s.integrity_failures,
            s.oversize_frames,
            s.downlink_frames
        );
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_in: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub send_failures: u64,
    pub integrity_failures: u64,
    pub oversize_frames: u64,
    pub downlink_frames: u64,
}
