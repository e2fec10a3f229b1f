//! # Serial Stream Framing
//!
//! Turns the unstructured flight controller byte stream into discrete
//! messages. Two interchangeable front-ends:
//! - [`marker::MarkerFramer`] for the custom record profile (`AA 55 ... 55 AA`)
//! - [`mavlink::MavlinkParser`] for self-delimiting MAVLink packets
//!
//! Both are fed one byte at a time and keep their own state between reads,
//! so a message may span any number of serial chunks.

pub mod marker;
pub mod mavlink;

use bytes::Bytes;
use tracing::warn;

use crate::error::Result;

/// Incremental message extractor
pub trait FrameSource: Send {
    /// Feed one byte
    ///
    /// Returns `Ok(Some(frame))` exactly once per completed message.
    ///
    /// # Errors
    ///
    /// `FrameTooLarge` when the partial message outgrows the buffer; the
    /// source has already reset itself and resumes scanning.
    fn push_byte(&mut self, byte: u8) -> Result<Option<Bytes>>;

    /// Drop any partial message and return to scanning
    fn reset(&mut self);
}

/// Lazy iterator of frames completed by a chunk of input
pub struct Frames<'a> {
    source: &'a mut dyn FrameSource,
    bytes: std::slice::Iter<'a, u8>,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        for &byte in self.bytes.by_ref() {
            match self.source.push_byte(byte) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Framing error: {}", e);
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Feed `chunk` into `source`, yielding each frame it completes
///
/// Bytes are only consumed as the iterator is advanced; a partially drained
/// iterator leaves the rest of the chunk unread.
pub fn frames<'a>(source: &'a mut dyn FrameSource, chunk: &'a [u8]) -> Frames<'a> {
    Frames {
        source,
        bytes: chunk.iter(),
    }
}
