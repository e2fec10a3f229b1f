//! # Network Transports
//!
//! Opaque send/receive primitives for the point-to-point radio and the mesh.
//! The relay only needs `send(peer, bytes)` and a receive that may block
//! until a datagram arrives; routing, association and peer discovery
//! belong to the platform underneath.

pub mod datagram;

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;

use crate::error::Result;

/// Address of a radio or mesh peer
pub type PeerAddr = SocketAddr;

/// Which link a message travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Wired link to the flight controller
    Serial,
    /// Point-to-point radio
    Radio,
    /// Multi-hop mesh
    Mesh,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Radio => write!(f, "radio"),
            TransportKind::Mesh => write!(f, "mesh"),
        }
    }
}

/// A received datagram: `len` bytes of the caller's buffer, sent by `from`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    pub len: usize,
    pub from: PeerAddr,
}

/// Network transport used by the relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Largest payload a single send carries
    fn max_payload(&self) -> usize;

    /// Send one datagram to `peer`
    ///
    /// # Errors
    ///
    /// `TransportSendFailed` naming the peer
    async fn send(&self, peer: &PeerAddr, data: &[u8]) -> Result<()>;

    /// Wait for the next datagram
    ///
    /// May wait indefinitely; callers cancel it by dropping the future.
    ///
    /// # Errors
    ///
    /// `TransportClosed` once the transport is torn down
    async fn recv(&self, buf: &mut [u8]) -> Result<Datagram>;
}
