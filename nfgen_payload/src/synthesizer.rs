//! Synthetic flow record generation.
//!
//! Every call fabricates one flow observed since the generator started. Field
//! values are drawn independently except where the record must stay
//! consistent: the last packet never precedes the first, neither is later than
//! the current uptime, and TCP flags only appear on TCP flows.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::{
    Config, Error,
    record::{FlowRecord, Protocol},
};

/// Exclusive upper bound on the packets in a flow
pub const MAX_PACKET_COUNT: u32 = 100_000;
/// Exclusive upper bound on the mean packet size of a flow, in octets
pub const MAX_MEAN_PACKET_SIZE: u32 = 300;
/// Length of the observation window, in seconds. Flows are at most this long
/// and end no earlier than this far back from the current uptime.
pub const FLOW_WINDOW_SECS: u32 = 60;

#[derive(Debug, Clone)]
/// Flow record synthesizer
pub struct FlowSynthesizer {
    address_pool: Vec<Ipv4Addr>,
}

impl FlowSynthesizer {
    /// Create a new [`FlowSynthesizer`] drawing addresses from the configured
    /// pool.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.valid()?;
        Ok(Self {
            address_pool: config.address_pool.clone(),
        })
    }

    /// Addresses flows are drawn from
    #[must_use]
    pub fn address_pool(&self) -> &[Ipv4Addr] {
        &self.address_pool
    }

    /// Fabricate one flow record as seen `uptime_millis` after generator
    /// start.
    pub fn synthesize<R>(&self, uptime_millis: u32, rng: &mut R) -> FlowRecord
    where
        R: Rng + ?Sized,
    {
        let source_address = self.address(rng);
        let destination_address = self.address(rng);
        let source_port: u16 = rng.random();
        let destination_port: u16 = rng.random();

        let packet_count = rng.random_range(0..MAX_PACKET_COUNT);
        let octet_count = packet_count * rng.random_range(0..MAX_MEAN_PACKET_SIZE);

        let (first_seen_millis, last_seen_millis) = Self::timestamps(uptime_millis, rng);

        let protocol = if rng.random_bool(0.5) {
            Protocol::Tcp
        } else {
            Protocol::Udp
        };
        let tcp_flags = match protocol {
            Protocol::Tcp => rng.random(),
            Protocol::Udp => 0,
        };

        FlowRecord {
            source_address,
            destination_address,
            source_port,
            destination_port,
            packet_count,
            octet_count,
            first_seen_millis,
            last_seen_millis,
            protocol,
            tcp_flags,
        }
    }

    fn address<R>(&self, rng: &mut R) -> Ipv4Addr
    where
        R: Rng + ?Sized,
    {
        self.address_pool[rng.random_range(0..self.address_pool.len())]
    }

    /// Flow start and end in milliseconds of uptime. Timing is drawn at one
    /// second granularity and scaled, so both values are whole seconds no
    /// later than `uptime_millis`.
    fn timestamps<R>(uptime_millis: u32, rng: &mut R) -> (u32, u32)
    where
        R: Rng + ?Sized,
    {
        let uptime = uptime_millis / 1000;
        let first = if uptime < FLOW_WINDOW_SECS {
            // not enough history to backdate the flow
            0
        } else {
            uptime - rng.random_range(1..FLOW_WINDOW_SECS)
        };
        let headroom = (uptime - first).min(FLOW_WINDOW_SECS - 1);
        let last = first + rng.random_range(0..=headroom);
        (first * 1000, last * 1000)
    }
}
