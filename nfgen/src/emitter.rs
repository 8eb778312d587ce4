//! The `NetFlow` v5 emission driver.
//!
//! The [`Emitter`] runs one cycle after another until told to stop: draw a
//! record count, synthesize that many flows, encode them behind a fresh
//! header, send the PDU to the collector, copy it to the capture file and
//! sleep. Cycles never overlap and nothing is buffered between them.

use std::{
    net::SocketAddrV4,
    num::NonZeroU64,
    path::PathBuf,
    time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH},
};

use metrics::counter;
use nfgen_payload::{
    FlowRecord, FlowSynthesizer, GeneratorState, PduEncoder, Timing, common::ConfRange,
    netflow::MAX_PDU_SIZE,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{capture, config, transport};

/// Errors produced by [`Emitter`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration or encoding rejected by the synthesis core
    #[error(transparent)]
    Payload(#[from] nfgen_payload::Error),
    /// The UDP socket could not be set up
    #[error(transparent)]
    Transport(#[from] transport::Error),
    /// The capture file could not be written
    #[error(transparent)]
    Capture(#[from] capture::Error),
    /// The system clock reads earlier than the Unix epoch
    #[error("System clock before Unix epoch: {0}")]
    Clock(#[from] SystemTimeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Configuration of [`Emitter`]
pub struct Config {
    /// Collector PDUs are sent to
    pub collector: SocketAddrV4,
    /// Seed of the one random source every draw comes from
    pub seed: u64,
    /// File each sent PDU is also written to
    pub capture_path: Option<PathBuf>,
    /// Stop after this many PDUs, run until shutdown if unset
    pub pdu_limit: Option<NonZeroU64>,
    /// Flow synthesis and pacing
    pub generation: config::Config,
}

/// Summary of one encoded PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pdu {
    len: usize,
    flows: u16,
}

#[derive(Debug)]
/// The `NetFlow` v5 emitter.
///
/// This generator synthesizes flow records and ships them to a collector over
/// UDP, one PDU per cycle.
pub struct Emitter {
    collector: SocketAddrV4,
    synthesizer: FlowSynthesizer,
    encoder: PduEncoder,
    state: GeneratorState,
    records_per_pdu: ConfRange<u16>,
    interval_seconds: ConfRange<u64>,
    capture_path: Option<PathBuf>,
    pdu_limit: Option<NonZeroU64>,
    records: Vec<FlowRecord>,
    metric_labels: Vec<(String, String)>,
    shutdown: broadcast::Receiver<()>,
}

impl Emitter {
    /// Create a new [`Emitter`] instance
    ///
    /// # Errors
    ///
    /// Creation will fail if the generation settings do not validate.
    pub fn new(config: Config, shutdown: broadcast::Receiver<()>) -> Result<Self, Error> {
        let generation = config.generation;
        generation.valid()?;

        let labels = vec![
            ("component".to_string(), "generator".to_string()),
            ("component_name".to_string(), "netflow_v5".to_string()),
        ];

        Ok(Self {
            collector: config.collector,
            synthesizer: FlowSynthesizer::new(&generation.payload())?,
            encoder: PduEncoder::new(generation.max_records_per_pdu)?,
            state: GeneratorState::from_seed(config.seed),
            records_per_pdu: generation.records_per_pdu,
            interval_seconds: generation.interval_seconds,
            capture_path: config.capture_path,
            pdu_limit: config.pdu_limit,
            records: Vec::with_capacity(usize::from(generation.max_records_per_pdu)),
            metric_labels: labels,
            shutdown,
        })
    }

    /// Run [`Emitter`] until the PDU limit is reached or a shutdown signal is
    /// received.
    ///
    /// A PDU the socket refuses is logged, counted and dropped; it is not
    /// captured and the next cycle proceeds as usual.
    ///
    /// # Errors
    ///
    /// Function will return an error if the socket cannot be bound, the
    /// capture file cannot be created or written, or the clock is unusable.
    pub async fn spin(mut self) -> Result<(), Error> {
        let transport = transport::Udp::bind(self.collector).await?;
        let mut capture = match self.capture_path.take() {
            Some(path) => Some(capture::CaptureFile::create(&path).await?),
            None => None,
        };
        info!(
            "NetFlow v5 emitter running, collector {collector}, {hosts} hosts in pool",
            collector = transport.collector(),
            hosts = self.synthesizer.address_pool().len(),
        );
        if let Some(capture) = &capture {
            info!("Capturing sent PDUs to {path}", path = capture.path().display());
        }

        let start_secs = unix_secs(SystemTime::now())?;
        let mut buf = [0_u8; MAX_PDU_SIZE];
        let mut emitted: u64 = 0;

        loop {
            let pdu = self.build_pdu(start_secs, unix_secs(SystemTime::now())?, &mut buf)?;
            let bytes = &buf[..pdu.len];
            emitted += 1;

            match transport.send(bytes).await {
                Ok(sent) => {
                    counter!("bytes_written", &self.metric_labels).increment(sent as u64);
                    counter!("packets_sent", &self.metric_labels).increment(1);
                    counter!("flows_sent", &self.metric_labels).increment(u64::from(pdu.flows));
                    if let Some(capture) = capture.as_mut() {
                        capture.write(bytes).await?;
                    }
                    info!(
                        "PDU of {len} bytes with {flows} flows sent, sequence {sequence}",
                        len = pdu.len,
                        flows = pdu.flows,
                        sequence = self.state.flow_sequence(),
                    );
                }
                Err(err) => {
                    warn!("PDU send failed: {err}");

                    let mut error_labels = self.metric_labels.clone();
                    error_labels.push(("error".to_string(), err.to_string()));
                    counter!("request_failure", &error_labels).increment(1);
                }
            }

            if self.pdu_limit.is_some_and(|limit| emitted >= limit.get()) {
                info!("PDU limit reached after {emitted} PDUs");
                return Ok(());
            }

            let delay = Duration::from_secs(self.interval_seconds.sample(self.state.rng()));
            debug!("Pausing {delay:?} before next PDU");
            tokio::select! {
                () = tokio::time::sleep(delay) => {},
                _ = self.shutdown.recv() => {
                    info!("shutdown signal received");
                    return Ok(());
                },
            }
        }
    }

    /// Synthesize and encode one PDU into `buf`, advancing the flow sequence.
    fn build_pdu(
        &mut self,
        start_secs: u64,
        now_secs: u64,
        buf: &mut [u8],
    ) -> Result<Pdu, nfgen_payload::Error> {
        let flows = self.records_per_pdu.sample(self.state.rng());
        let timing = Timing::sample(start_secs, now_secs, self.state.rng());

        self.records.clear();
        for _ in 0..flows {
            let record = self
                .synthesizer
                .synthesize(timing.sys_uptime_millis, self.state.rng());
            self.records.push(record);
        }

        // The header carries the running total including this PDU's flows.
        let sequence = self.state.advance(flows);
        let len = self.encoder.encode(&self.records, timing, sequence, buf)?;
        Ok(Pdu { len, flows })
    }
}

fn unix_secs(now: SystemTime) -> Result<u64, SystemTimeError> {
    Ok(now.duration_since(UNIX_EPOCH)?.as_secs())
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};

    use nfgen_payload::netflow::{HEADER_SIZE, RECORD_SIZE};
    use tokio::net::UdpSocket;

    use super::*;

    fn be16(b: &[u8], at: usize) -> u16 {
        u16::from_be_bytes([b[at], b[at + 1]])
    }

    fn be32(b: &[u8], at: usize) -> u32 {
        u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    async fn collector() -> (UdpSocket, SocketAddrV4) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind collector");
        let addr = match socket.local_addr().expect("collector address") {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!("bound to an IPv4 address"),
        };
        (socket, addr)
    }

    fn emitter_config(collector: SocketAddrV4) -> Config {
        Config {
            collector,
            seed: 42,
            capture_path: None,
            pdu_limit: None,
            generation: config::Config {
                interval_seconds: ConfRange::Constant(0),
                ..config::Config::default()
            },
        }
    }

    #[test]
    fn invalid_generation_rejected() {
        let (_tx, rx) = broadcast::channel(1);
        let mut config = emitter_config(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2055));
        config.generation.address_pool.clear();
        assert!(matches!(
            Emitter::new(config, rx),
            Err(Error::Payload(nfgen_payload::Error::Validation(_)))
        ));
    }

    #[test]
    fn constant_record_count() {
        let (_tx, rx) = broadcast::channel(1);
        let mut config = emitter_config(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2055));
        config.generation.records_per_pdu = ConfRange::Constant(3);
        let mut emitter = Emitter::new(config, rx).expect("valid config");

        let mut buf = [0_u8; MAX_PDU_SIZE];
        let pdu = emitter
            .build_pdu(1_000, 1_000, &mut buf)
            .expect("pdu encodes");
        assert_eq!(pdu.len, 168);
        assert_eq!(pdu.flows, 3);
        assert_eq!(emitter.state.flow_sequence(), 3);
        assert_eq!(&buf[..4], &[0x00, 0x05, 0x00, 0x03]);
        assert_eq!(be32(&buf, 4), 0, "uptime at start");
        assert_eq!(be32(&buf, 16), 3, "sequence counts this PDU");
    }

    #[test]
    fn same_seed_same_pdus() {
        let (_tx, rx) = broadcast::channel(1);
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 2055);
        let mut a = Emitter::new(emitter_config(addr), rx.resubscribe()).expect("valid config");
        let mut b = Emitter::new(emitter_config(addr), rx).expect("valid config");

        let mut buf_a = [0_u8; MAX_PDU_SIZE];
        let mut buf_b = [0_u8; MAX_PDU_SIZE];
        for now in [100, 130, 190] {
            let pa = a.build_pdu(100, now, &mut buf_a).expect("pdu encodes");
            let pb = b.build_pdu(100, now, &mut buf_b).expect("pdu encodes");
            assert_eq!(pa, pb);
            assert_eq!(&buf_a[..pa.len], &buf_b[..pb.len]);
        }
    }

    #[tokio::test]
    async fn delivers_pdus_and_captures_them() {
        let (socket, addr) = collector().await;
        let dir = tempfile::tempdir().expect("temp dir");
        let capture_path = dir.path().join("flows.bin");

        let (_tx, rx) = broadcast::channel(1);
        let mut config = emitter_config(addr);
        config.capture_path = Some(capture_path.clone());
        config.pdu_limit = NonZeroU64::new(5);
        Emitter::new(config, rx)
            .expect("valid config")
            .spin()
            .await
            .expect("emitter runs to its limit");

        let mut received = Vec::new();
        let mut previous_sequence = 0_u32;
        for _ in 0..5 {
            let mut buf = [0_u8; 2048];
            let (n, _) = socket.recv_from(&mut buf).await.expect("recv pdu");
            let pdu = &buf[..n];

            assert_eq!(be16(pdu, 0), 5, "version");
            let count = be16(pdu, 2);
            assert!((1..=30).contains(&count));
            assert_eq!(n, HEADER_SIZE + usize::from(count) * RECORD_SIZE);
            let sequence = be32(pdu, 16);
            assert_eq!(sequence.wrapping_sub(previous_sequence), u32::from(count));
            previous_sequence = sequence;

            received.extend_from_slice(pdu);
        }

        let captured = std::fs::read(&capture_path).expect("read capture");
        assert_eq!(captured, received);
    }

    #[tokio::test]
    async fn refused_sends_skip_capture_and_continue() {
        // without SO_BROADCAST the kernel refuses every datagram
        let dir = tempfile::tempdir().expect("temp dir");
        let capture_path = dir.path().join("flows.bin");

        let (_tx, rx) = broadcast::channel(1);
        let mut config = emitter_config(SocketAddrV4::new(Ipv4Addr::BROADCAST, 2055));
        config.capture_path = Some(capture_path.clone());
        config.pdu_limit = NonZeroU64::new(3);
        let emitter = Emitter::new(config, rx).expect("valid config");

        assert!(emitter.spin().await.is_ok());
        let captured = std::fs::read(&capture_path).expect("read capture");
        assert!(captured.is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_pause() {
        let (socket, addr) = collector().await;
        let (tx, rx) = broadcast::channel(1);
        let mut config = emitter_config(addr);
        config.generation.interval_seconds = ConfRange::Constant(3600);
        let handle = tokio::spawn(Emitter::new(config, rx).expect("valid config").spin());

        let mut buf = [0_u8; 2048];
        socket.recv_from(&mut buf).await.expect("first pdu");
        tx.send(()).expect("emitter listening");

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("emitter stops promptly")
            .expect("emitter task joins")
            .expect("emitter exits cleanly");
    }
}
