//! # Error Types
//!
//! Custom error types for the relay using `thiserror`.

use thiserror::Error;

use crate::transport::TransportKind;

/// Main error type for the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Encode/decode given less space than the wire format needs
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Record checksum does not match its payload
    #[error("Checksum mismatch: received 0x{received:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// Framer ran out of room before seeing an end marker
    #[error("Frame exceeds capacity of {capacity} bytes")]
    FrameTooLarge { capacity: usize },

    /// A single peer send failed
    #[error("Send to {peer} over {transport} failed: {reason}")]
    TransportSendFailed {
        transport: TransportKind,
        peer: String,
        reason: String,
    },

    /// Outbound transport has no usable link
    #[error("{0} transport unavailable")]
    TransportUnavailable(TransportKind),

    /// Transport was torn down (EOF, socket closed)
    #[error("{0} transport closed")]
    TransportClosed(TransportKind),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the relay
pub type Result<T> = std::result::Result<T, RelayError>;
