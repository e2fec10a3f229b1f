//! # Start/End Marker Framer
//!
//! Extracts frames delimited by `AA 55 ... 55 AA` from a noisy serial
//! stream. An `END1` byte that is not followed by `END2` is treated as
//! payload and put back into the frame.
//!
//! Any byte other than `START2` after `START1` is discarded and scanning
//! restarts from the next byte, so `AA AA 55` does not open a frame.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use super::FrameSource;
use crate::error::{RelayError, Result};

pub const START_MARKER_1: u8 = 0xAA;
pub const START_MARKER_2: u8 = 0x55;
pub const END_MARKER_1: u8 = 0x55;
pub const END_MARKER_2: u8 = 0xAA;

/// Default frame buffer capacity (matches the flight controller UART buffer)
pub const DEFAULT_FRAME_CAPACITY: usize = 512;

/// Framer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    AwaitStart1,
    AwaitStart2,
    Receiving,
    /// Saw END1 while receiving; the next byte decides
    AwaitEnd1,
}

/// Byte-at-a-time marker framer
///
/// Owns a bounded frame buffer that is reset after every emitted frame and
/// after every overflow.
#[derive(Debug)]
pub struct MarkerFramer {
    state: FramerState,
    buffer: BytesMut,
    capacity: usize,
}

impl MarkerFramer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: FramerState::AwaitStart1,
            buffer: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes collected for the frame in progress
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn overflow(&mut self) -> RelayError {
        warn!(
            "Frame buffer overflow ({} bytes), dropping partial frame",
            self.capacity
        );
        self.reset();
        RelayError::FrameTooLarge {
            capacity: self.capacity,
        }
    }
}

impl Default for MarkerFramer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}

impl FrameSource for MarkerFramer {
    fn push_byte(&mut self, byte: u8) -> Result<Option<Bytes>> {
        match self.state {
            FramerState::AwaitStart1 => {
                if byte == START_MARKER_1 {
                    self.state = FramerState::AwaitStart2;
                }
            }

            FramerState::AwaitStart2 => {
                if byte == START_MARKER_2 {
                    self.buffer.clear();
                    self.state = FramerState::Receiving;
                    debug!("Start marker received");
                } else {
                    debug!("Expected second start marker, got 0x{:02X}", byte);
                    self.state = FramerState::AwaitStart1;
                }
            }

            FramerState::Receiving => {
                if byte == END_MARKER_1 {
                    self.state = FramerState::AwaitEnd1;
                } else if self.buffer.len() < self.capacity {
                    self.buffer.put_u8(byte);
                } else {
                    return Err(self.overflow());
                }
            }

            FramerState::AwaitEnd1 => {
                if byte == END_MARKER_2 {
                    self.state = FramerState::AwaitStart1;
                    let frame = self.buffer.split().freeze();
                    if frame.is_empty() {
                        debug!("Empty frame discarded");
                        return Ok(None);
                    }
                    debug!("Frame complete ({} bytes)", frame.len());
                    return Ok(Some(frame));
                }

                // False end marker: END1 belonged to the payload
                if self.buffer.len() + 2 <= self.capacity {
                    self.buffer.put_u8(END_MARKER_1);
                    self.buffer.put_u8(byte);
                    self.state = FramerState::Receiving;
                } else {
                    return Err(self.overflow());
                }
            }
        }

        Ok(None)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = FramerState::AwaitStart1;
    }
}

/// Wrap a payload in start/end markers for the serial link
pub fn wrap_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + 4);
    frame.put_slice(&[START_MARKER_1, START_MARKER_2]);
    frame.put_slice(payload);
    frame.put_slice(&[END_MARKER_1, END_MARKER_2]);
    frame.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::frames;

    fn collect(framer: &mut MarkerFramer, data: &[u8]) -> Vec<Vec<u8>> {
        frames(framer, data)
            .filter_map(|item| item.ok())
            .map(|frame| frame.to_vec())
            .collect()
    }

    #[test]
    fn test_simple_frame() {
        let mut framer = MarkerFramer::default();
        let out = collect(&mut framer, &[0xAA, 0x55, 1, 2, 3, 0x55, 0xAA]);
        assert_eq!(out, vec![vec![1, 2, 3]]);
        assert_eq!(framer.state(), FramerState::AwaitStart1);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_noise_before_start_is_skipped() {
        let mut framer = MarkerFramer::default();
        let out = collect(&mut framer, &[0x00, 0x13, 0x55, 0xAA, 0x55, 9, 0x55, 0xAA]);
        assert_eq!(out, vec![vec![9]]);
    }

    #[test]
    fn test_false_end_marker_is_reinserted() {
        let mut framer = MarkerFramer::default();
        let data = [0xAA, 0x55, 0x10, 0x55, 0x20, 0x30, 0x55, 0xAA];
        let out = collect(&mut framer, &data);
        assert_eq!(out, vec![vec![0x10, 0x55, 0x20, 0x30]]);
    }

    #[test]
    fn test_double_end1_is_reinserted_verbatim() {
        // 55 55 inside the payload: the second 55 goes in as a plain byte
        let mut framer = MarkerFramer::default();
        let data = [0xAA, 0x55, 0x01, 0x55, 0x55, 0x02, 0x55, 0xAA];
        let out = collect(&mut framer, &data);
        assert_eq!(out, vec![vec![0x01, 0x55, 0x55, 0x02]]);
    }

    #[test]
    fn test_bad_second_start_marker_rescans() {
        let mut framer = MarkerFramer::default();
        framer.push_byte(0xAA).unwrap();
        assert_eq!(framer.state(), FramerState::AwaitStart2);
        framer.push_byte(0x00).unwrap();
        assert_eq!(framer.state(), FramerState::AwaitStart1);

        let out = collect(&mut framer, &[0xAA, 0x55, 7, 0x55, 0xAA]);
        assert_eq!(out, vec![vec![7]]);
    }

    #[test]
    fn test_repeated_start1_drops_candidate() {
        let mut framer = MarkerFramer::default();
        framer.push_byte(0xAA).unwrap();
        framer.push_byte(0xAA).unwrap();
        assert_eq!(framer.state(), FramerState::AwaitStart1);

        // AA AA 55 opens nothing; the next full start marker does
        let data = [0xAA, 0xAA, 0x55, 7, 0x55, 0xAA, 0x00, 0xAA, 0x55, 8, 0x55, 0xAA];
        assert_eq!(collect(&mut framer, &data), vec![vec![8]]);
    }

    #[test]
    fn test_overflow_drops_partial_frame() {
        let mut framer = MarkerFramer::new(8);
        let mut data = vec![0xAA, 0x55];
        data.extend_from_slice(&[0x01; 9]);

        let results: Vec<_> = frames(&mut framer, &data).collect();
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(RelayError::FrameTooLarge { capacity }) => assert_eq!(*capacity, 8),
            other => panic!("Expected FrameTooLarge, got: {:?}", other),
        }
        assert_eq!(framer.state(), FramerState::AwaitStart1);
        assert_eq!(framer.pending(), 0);

        // Scanning resumes with the next start marker
        let out = collect(&mut framer, &[0x01, 0xAA, 0x55, 5, 0x55, 0xAA]);
        assert_eq!(out, vec![vec![5]]);
    }

    #[test]
    fn test_overflow_on_reinsertion() {
        let mut framer = MarkerFramer::new(4);
        let data = [0xAA, 0x55, 1, 2, 3, 0x55, 0x04];
        let results: Vec<_> = frames(&mut framer, &data).collect();
        assert!(matches!(results.as_slice(), [Err(RelayError::FrameTooLarge { .. })]));
        assert_eq!(framer.state(), FramerState::AwaitStart1);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut framer = MarkerFramer::default();
        assert!(collect(&mut framer, &[0xAA, 0x55, 1, 2]).is_empty());
        assert!(collect(&mut framer, &[3, 0x55]).is_empty());
        assert_eq!(collect(&mut framer, &[0xAA]), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut framer = MarkerFramer::default();
        let data = [0xAA, 0x55, 1, 0x55, 0xAA, 0xAA, 0x55, 2, 0x55, 0xAA];
        assert_eq!(collect(&mut framer, &data), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_empty_frame_is_not_emitted() {
        let mut framer = MarkerFramer::default();
        assert!(collect(&mut framer, &[0xAA, 0x55, 0x55, 0xAA]).is_empty());
        assert_eq!(framer.state(), FramerState::AwaitStart1);
    }

    #[test]
    fn test_wrap_frame_round_trips_through_framer() {
        let payload = [0x01, 0x55, 0x02, 0xAA, 0x03];
        let wrapped = wrap_frame(&payload);
        assert_eq!(&wrapped[..2], &[0xAA, 0x55]);
        assert_eq!(&wrapped[wrapped.len() - 2..], &[0x55, 0xAA]);

        let mut framer = MarkerFramer::default();
        assert_eq!(collect(&mut framer, &wrapped), vec![payload.to_vec()]);
    }

    #[test]
    fn test_encoded_record_survives_framing() {
        use crate::message::decoder::decode;
        use crate::message::encoder::encode_to_vec;
        use crate::message::record::TelemetryRecord;

        let packet = encode_to_vec(&TelemetryRecord::default());
        let mut framer = MarkerFramer::default();
        let out = collect(&mut framer, &wrap_frame(&packet));

        assert_eq!(out.len(), 1);
        let decoded = decode(&out[0]).unwrap();
        assert_eq!(decoded.record.battery_percent, 100);
    }
}
