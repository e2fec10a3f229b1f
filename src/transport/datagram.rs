//! # Datagram Transport
//!
//! UDP-backed radio and mesh links. On the bench the radio module and the
//! mesh root are reached as UDP endpoints; the relay never sees more than
//! whole datagrams.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::{Datagram, PeerAddr, Transport, TransportKind};
use crate::error::{RelayError, Result};

/// Point-to-point radio payload cap (ESP-NOW style)
pub const RADIO_MAX_PAYLOAD: usize = 250;

/// Mesh payload cap (one mesh packet, no fragmentation)
pub const MESH_MAX_PAYLOAD: usize = 1456;

/// What to do with payloads above `max_payload`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversizePolicy {
    /// Send the first `max_payload` bytes and warn
    Truncate,
    /// Refuse the send
    Reject,
}

impl OversizePolicy {
    pub fn for_kind(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Radio => OversizePolicy::Truncate,
            _ => OversizePolicy::Reject,
        }
    }
}

/// UDP socket wrapped as a relay transport
#[derive(Debug)]
pub struct DatagramTransport {
    kind: TransportKind,
    socket: UdpSocket,
    max_payload: usize,
    policy: OversizePolicy,
}

impl DatagramTransport {
    /// Bind a transport on `addr`
    ///
    /// # Errors
    ///
    /// `Io` if the socket cannot be bound
    pub async fn bind(kind: TransportKind, addr: SocketAddr, max_payload: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(
            "{} transport bound on {} (max payload {} bytes)",
            kind,
            socket.local_addr()?,
            max_payload
        );

        Ok(Self {
            kind,
            socket,
            max_payload,
            policy: OversizePolicy::for_kind(kind),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn clip<'a>(&self, peer: &PeerAddr, data: &'a [u8]) -> Result<&'a [u8]> {
        if data.len() <= self.max_payload {
            return Ok(data);
        }

        match self.policy {
            OversizePolicy::Truncate => {
                warn!(
                    "{} payload to {} exceeds limit ({} > {} bytes), truncating",
                    self.kind,
                    peer,
                    data.len(),
                    self.max_payload
                );
                Ok(&data[..self.max_payload])
            }
            OversizePolicy::Reject => Err(RelayError::TransportSendFailed {
                transport: self.kind,
                peer: peer.to_string(),
                reason: format!(
                    "payload of {} bytes exceeds limit of {}",
                    data.len(),
                    self.max_payload
                ),
            }),
        }
    }
}

#[async_trait]
impl Transport for DatagramTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }

    async fn send(&self, peer: &PeerAddr, data: &[u8]) -> Result<()> {
        let payload = self.clip(peer, data)?;

        self.socket
            .send_to(payload, *peer)
            .await
            .map_err(|e| RelayError::TransportSendFailed {
                transport: self.kind,
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Sent {} bytes to {} over {}", payload.len(), peer, self.kind);
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<Datagram> {
        let (len, from) = self.socket.recv_from(buf).await?;

        let len = if len > self.max_payload {
            warn!(
                "{} datagram from {} too large ({} bytes), truncating to {}",
                self.kind, from, len, self.max_payload
            );
            self.max_payload
        } else {
            len
        };

        debug!("Received {} bytes from {} over {}", len, from, self.kind);
        Ok(Datagram { len, from })
    }
}
