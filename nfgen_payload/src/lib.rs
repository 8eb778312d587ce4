//! The nfgen payloads
//!
//! This library fabricates synthetic `NetFlow` v5 flow records and lays them
//! out on the wire. It performs no I/O: callers own the random source, the
//! flow sequence and whatever transport the encoded bytes are handed to.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

use std::net::Ipv4Addr;

use serde::Deserialize;

pub mod common;
pub mod netflow;
pub mod record;
pub mod state;
pub mod synthesizer;

pub use netflow::{PduEncoder, Timing};
pub use record::{FlowRecord, Protocol};
pub use state::GeneratorState;
pub use synthesizer::FlowSynthesizer;

/// Errors produced while building or encoding a PDU
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The number of records handed to the encoder is zero or above the
    /// per-PDU maximum.
    #[error("Invalid record count {count}, must be within 1..={max}")]
    InvalidRecordCount {
        /// Number of records requested
        count: usize,
        /// Configured per-PDU maximum
        max: u16,
    },
    /// The destination buffer cannot hold the encoded PDU.
    #[error("Buffer too small for PDU: {available} bytes available, {required} required")]
    BufferTooSmall {
        /// Bytes the PDU needs
        required: usize,
        /// Bytes the buffer offers
        available: usize,
    },
    /// Configuration is not usable
    #[error("Validation error: {0}")]
    Validation(String),
}

fn default_address_pool() -> Vec<Ipv4Addr> {
    vec![
        Ipv4Addr::LOCALHOST,
        Ipv4Addr::new(192, 168, 1, 100),
        Ipv4Addr::new(192, 168, 1, 101),
        Ipv4Addr::new(192, 168, 1, 102),
    ]
}

fn default_max_records_per_pdu() -> u16 {
    netflow::MAX_RECORDS_PER_PDU
}

/// Configuration of the synthesis and encoding core
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Addresses that source and destination of every flow are drawn from
    #[serde(default = "default_address_pool")]
    pub address_pool: Vec<Ipv4Addr>,
    /// Upper bound on the records carried by a single PDU
    #[serde(default = "default_max_records_per_pdu")]
    pub max_records_per_pdu: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address_pool: default_address_pool(),
            max_records_per_pdu: default_max_records_per_pdu(),
        }
    }
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the address pool is empty or the
    /// per-PDU maximum is zero or would overflow one unfragmented datagram.
    pub fn valid(&self) -> Result<(), Error> {
        if self.address_pool.is_empty() {
            return Err(Error::Validation(
                "address_pool must hold at least one address".to_string(),
            ));
        }
        if self.max_records_per_pdu == 0 {
            return Err(Error::Validation(
                "max_records_per_pdu must be non-zero".to_string(),
            ));
        }
        if self.max_records_per_pdu > netflow::MAX_RECORDS_PER_PDU {
            return Err(Error::Validation(format!(
                "max_records_per_pdu should not exceed {} to stay within MTU limits",
                netflow::MAX_RECORDS_PER_PDU
            )));
        }
        Ok(())
    }
}
