//! UDP delivery of encoded PDUs.
//!
//! One datagram carries exactly one PDU. Delivery is fire and forget: a
//! datagram either leaves whole or the send is reported as failed, and the
//! caller decides what a failure costs. Nothing is retried here.

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
};

use tokio::net::UdpSocket;
use tracing::debug;

/// Errors produced by [`Udp`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The kernel accepted only part of the datagram
    #[error("Short send to collector: {sent} of {expected} bytes")]
    ShortSend {
        /// Bytes the socket reported sent
        sent: usize,
        /// Bytes in the PDU
        expected: usize,
    },
    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
/// Datagram sender bound to an ephemeral local port
pub struct Udp {
    socket: UdpSocket,
    collector: SocketAddrV4,
}

impl Udp {
    /// Bind an ephemeral IPv4 socket for sending to `collector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if no local port can be bound.
    pub async fn bind(collector: SocketAddrV4) -> Result<Self, Error> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
        debug!(
            "UDP port {local} bound for collector {collector}",
            local = socket.local_addr()?
        );
        Ok(Self { socket, collector })
    }

    /// Collector datagrams are addressed to
    #[must_use]
    pub fn collector(&self) -> SocketAddrV4 {
        self.collector
    }

    /// Send `pdu` as a single datagram, returning the bytes sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket rejects the datagram and
    /// [`Error::ShortSend`] if it is only partly sent.
    pub async fn send(&self, pdu: &[u8]) -> Result<usize, Error> {
        let sent = self.socket.send_to(pdu, self.collector).await?;
        if sent != pdu.len() {
            return Err(Error::ShortSend {
                sent,
                expected: pdu.len(),
            });
        }
        Ok(sent)
    }
}
