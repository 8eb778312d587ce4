//! This module controls configuration parsing from the end user. Every key is
//! optional; an absent file behaves exactly like an empty one.

use std::{
    fs, io,
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use nfgen_payload::{common::ConfRange, netflow::MAX_RECORDS_PER_PDU};
use serde::Deserialize;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// Configuration parsed but is not usable
    #[error(transparent)]
    Validation(#[from] nfgen_payload::Error),
}

fn default_address_pool() -> Vec<Ipv4Addr> {
    nfgen_payload::Config::default().address_pool
}

fn default_max_records_per_pdu() -> u16 {
    MAX_RECORDS_PER_PDU
}

fn default_records_per_pdu() -> ConfRange<u16> {
    ConfRange::Inclusive {
        min: 1,
        max: MAX_RECORDS_PER_PDU,
    }
}

fn default_interval_seconds() -> ConfRange<u64> {
    ConfRange::Inclusive { min: 0, max: 2 }
}

/// Main configuration struct for this program
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Addresses flow endpoints are drawn from. Replaced wholesale by the
    /// contents of `hosts_file` when that is set.
    #[serde(default = "default_address_pool")]
    pub address_pool: Vec<Ipv4Addr>,
    /// File listing one IPv4 address per line
    #[serde(default)]
    pub hosts_file: Option<PathBuf>,
    /// Upper bound on the records a single PDU may carry
    #[serde(default = "default_max_records_per_pdu")]
    pub max_records_per_pdu: u16,
    /// Records placed in each PDU
    #[serde(default = "default_records_per_pdu")]
    pub records_per_pdu: ConfRange<u16>,
    /// Pause between PDUs, in whole seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: ConfRange<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address_pool: default_address_pool(),
            hosts_file: None,
            max_records_per_pdu: default_max_records_per_pdu(),
            records_per_pdu: default_records_per_pdu(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl Config {
    /// Read and validate the YAML configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// describes an unusable configuration.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.valid()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`nfgen_payload::Error::Validation`] if the address pool or
    /// PDU bound is unusable, either range is inverted, or records per PDU
    /// falls outside `1..=max_records_per_pdu`.
    pub fn valid(&self) -> Result<(), nfgen_payload::Error> {
        self.payload().valid()?;
        self.records_per_pdu.valid("records_per_pdu")?;
        self.interval_seconds.valid("interval_seconds")?;
        if self.records_per_pdu.start() == 0
            || self.records_per_pdu.end() > self.max_records_per_pdu
        {
            return Err(nfgen_payload::Error::Validation(format!(
                "records_per_pdu {} must be within 1..={}",
                self.records_per_pdu, self.max_records_per_pdu
            )));
        }
        Ok(())
    }

    /// The slice of this configuration consumed by the synthesis core
    #[must_use]
    pub fn payload(&self) -> nfgen_payload::Config {
        nfgen_payload::Config {
            address_pool: self.address_pool.clone(),
            max_records_per_pdu: self.max_records_per_pdu,
        }
    }
}
