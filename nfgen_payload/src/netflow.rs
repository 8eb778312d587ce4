//! `NetFlow` v5 PDU encoding.
//!
//! A PDU is a 24 byte header followed by `count` 48 byte flow records with no
//! padding in between. Every multi-byte integer is big-endian. Fields the
//! generator does not model are written as zero.

use std::io::{self, Write};

use rand::Rng;
use tracing::trace;

use crate::{Error, record::FlowRecord};

/// `NetFlow` version carried in every header
pub const VERSION: u16 = 5;
/// Size of the PDU header in bytes
pub const HEADER_SIZE: usize = 24;
/// Size of one flow record in bytes
pub const RECORD_SIZE: usize = 48;
/// Most records a PDU may carry and still fit one unfragmented datagram
pub const MAX_RECORDS_PER_PDU: u16 = 30;
/// Size of the largest PDU, 1464 bytes
pub const MAX_PDU_SIZE: usize = pdu_size(MAX_RECORDS_PER_PDU as usize);

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Serialized size of a PDU carrying `records` flow records
#[must_use]
pub const fn pdu_size(records: usize) -> usize {
    HEADER_SIZE + records * RECORD_SIZE
}

/// Clock values stamped into a PDU header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Milliseconds since the generator started
    pub sys_uptime_millis: u32,
    /// Seconds since the Unix epoch at emission
    pub unix_secs: u32,
    /// Residual nanoseconds
    pub unix_nsecs: u32,
}

impl Timing {
    /// Build header timing from whole Unix seconds. Uptime is
    /// `(now - start) * 1000`, zero if the clock stepped backwards, and wraps
    /// at the width of the wire field like a real exporter's.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(start_secs: u64, now_secs: u64, unix_nsecs: u32) -> Self {
        let uptime = now_secs.saturating_sub(start_secs).wrapping_mul(1000);
        Self {
            sys_uptime_millis: uptime as u32,
            unix_secs: now_secs as u32,
            unix_nsecs: unix_nsecs % NANOS_PER_SEC,
        }
    }

    /// As [`Timing::new`] with synthetic residual nanoseconds. The generator
    /// keeps whole-second clocks only, so the sub-second part is drawn rather
    /// than measured.
    pub fn sample<R>(start_secs: u64, now_secs: u64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self::new(start_secs, now_secs, rng.random_range(0..NANOS_PER_SEC))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Serializes headers and flow records into `NetFlow` v5 PDUs.
pub struct PduEncoder {
    max_records: u16,
}

impl Default for PduEncoder {
    fn default() -> Self {
        Self {
            max_records: MAX_RECORDS_PER_PDU,
        }
    }
}

impl PduEncoder {
    /// Create a new [`PduEncoder`] accepting at most `max_records` records per
    /// PDU.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `max_records` is zero or above
    /// [`MAX_RECORDS_PER_PDU`].
    pub fn new(max_records: u16) -> Result<Self, Error> {
        if max_records == 0 || max_records > MAX_RECORDS_PER_PDU {
            return Err(Error::Validation(format!(
                "max_records must be within 1..={MAX_RECORDS_PER_PDU}, got {max_records}"
            )));
        }
        Ok(Self { max_records })
    }

    /// Largest record count this encoder accepts
    #[must_use]
    pub fn max_records(&self) -> u16 {
        self.max_records
    }

    /// Encode `records` under a header built from `timing` and
    /// `flow_sequence` into the front of `buf`, returning the number of bytes
    /// written.
    ///
    /// Nothing is written unless the whole PDU fits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecordCount`] if `records` is empty or longer
    /// than the encoder maximum and [`Error::BufferTooSmall`] if `buf` cannot
    /// hold the PDU.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(
        &self,
        records: &[FlowRecord],
        timing: Timing,
        flow_sequence: u32,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        if records.is_empty() || records.len() > usize::from(self.max_records) {
            return Err(Error::InvalidRecordCount {
                count: records.len(),
                max: self.max_records,
            });
        }
        let required = pdu_size(records.len());
        if buf.len() < required {
            return Err(Error::BufferTooSmall {
                required,
                available: buf.len(),
            });
        }

        let available = buf.len();
        let mut writer: &mut [u8] = &mut buf[..required];
        // records.len() <= max_records, a u16
        write_header(records.len() as u16, timing, flow_sequence, &mut writer)
            .and_then(|()| {
                records
                    .iter()
                    .try_for_each(|record| write_record(record, &mut writer))
            })
            .map_err(|_| Error::BufferTooSmall {
                required,
                available,
            })?;
        debug_assert!(writer.is_empty());

        trace!(
            "Encoded PDU of {required} bytes with {} records, sequence {flow_sequence}",
            records.len()
        );
        Ok(required)
    }
}

fn write_header<W>(
    count: u16,
    timing: Timing,
    flow_sequence: u32,
    writer: &mut W,
) -> io::Result<()>
where
    W: Write,
{
    writer.write_all(&VERSION.to_be_bytes())?;
    writer.write_all(&count.to_be_bytes())?;
    writer.write_all(&timing.sys_uptime_millis.to_be_bytes())?;
    writer.write_all(&timing.unix_secs.to_be_bytes())?;
    writer.write_all(&timing.unix_nsecs.to_be_bytes())?;
    writer.write_all(&flow_sequence.to_be_bytes())?;
    // engine type, engine id, reserved
    writer.write_all(&[0, 0, 0, 0])?;
    Ok(())
}

fn write_record<W>(record: &FlowRecord, writer: &mut W) -> io::Result<()>
where
    W: Write,
{
    writer.write_all(&record.source_address.octets())?;
    writer.write_all(&record.destination_address.octets())?;
    // next hop, input and output interface
    writer.write_all(&[0; 8])?;
    writer.write_all(&record.packet_count.to_be_bytes())?;
    writer.write_all(&record.octet_count.to_be_bytes())?;
    writer.write_all(&record.first_seen_millis.to_be_bytes())?;
    writer.write_all(&record.last_seen_millis.to_be_bytes())?;
    writer.write_all(&record.source_port.to_be_bytes())?;
    writer.write_all(&record.destination_port.to_be_bytes())?;
    writer.write_all(&[0, record.tcp_flags, record.protocol.number(), 0])?;
    // source and destination AS, masks, drops
    writer.write_all(&[0; 8])?;
    Ok(())
}
