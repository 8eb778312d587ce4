//! Flow record values
//!
//! A [`FlowRecord`] summarizes one unidirectional conversation. Records carry
//! no identity beyond their slot in a PDU; they are built, serialized and
//! dropped.

use std::net::Ipv4Addr;

/// IP protocols a synthetic flow may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    /// Transmission Control Protocol
    Tcp = 6,
    /// User Datagram Protocol
    Udp = 17,
}

impl Protocol {
    /// IANA protocol number, as carried in the `prot` field
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Protocol::number`]
    #[cfg(test)]
    pub(crate) fn from_number(number: u8) -> Option<Self> {
        match number {
            6 => Some(Self::Tcp),
            17 => Some(Self::Udp),
            _ => None,
        }
    }
}

/// One synthetic flow
///
/// Fields the generator does not model (next hop, interface indices, ToS,
/// AS numbers, prefix masks, drops) are absent here and always go out on the
/// wire as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    /// Source IPv4 address
    pub source_address: Ipv4Addr,
    /// Destination IPv4 address
    pub destination_address: Ipv4Addr,
    /// Source transport port
    pub source_port: u16,
    /// Destination transport port
    pub destination_port: u16,
    /// Packets in the flow
    pub packet_count: u32,
    /// Octets in the flow
    pub octet_count: u32,
    /// System uptime, in milliseconds, at the first packet of the flow
    pub first_seen_millis: u32,
    /// System uptime, in milliseconds, at the last packet of the flow
    pub last_seen_millis: u32,
    /// Transport protocol
    pub protocol: Protocol,
    /// Cumulative OR of TCP flags, zero for anything but TCP
    pub tcp_flags: u8,
}
