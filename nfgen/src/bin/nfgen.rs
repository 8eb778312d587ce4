use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    num::NonZeroU64,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use nfgen::{config::Config, emitter, hosts};
use tokio::{runtime::Builder, signal, sync::broadcast};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to load nfgen config: {0}")]
    Config(#[from] nfgen::config::Error),
    #[error("Failed to load host list: {0}")]
    Hosts(#[from] hosts::Error),
    #[error("NetFlow emitter returned an error: {0}")]
    Emitter(#[from] emitter::Error),
    #[error("Could not join the emitter task: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Failed to install prometheus recorder: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

// Every value is parsed strictly: a malformed address, an out of range port or
// a zero PDU count is a usage error.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// IPv4 address of the collector
    #[clap(short, long, default_value_t = Ipv4Addr::LOCALHOST)]
    address: Ipv4Addr,
    /// UDP port of the collector
    #[clap(short, long, default_value_t = 2055)]
    port: u16,
    /// seed for the random source, defaults to the current Unix time
    #[clap(short, long)]
    seed: Option<u64>,
    /// file every sent PDU is also written to
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// path on disk to the YAML configuration file
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// file of IPv4 addresses, one per line, replacing the address pool
    #[clap(long)]
    hosts_file: Option<PathBuf>,
    /// stop after this many PDUs
    #[clap(long)]
    pdu_count: Option<NonZeroU64>,
    /// address to expose prometheus metrics on
    #[clap(long)]
    prometheus_addr: Option<SocketAddr>,
}

fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs())
}

fn get_config(cli: Cli, contents: Option<&str>) -> Result<emitter::Config, Error> {
    let mut generation = match (contents, &cli.config_path) {
        (Some(contents), _) => {
            let config: Config = serde_yaml::from_str(contents).map_err(nfgen::config::Error::from)?;
            config.valid().map_err(nfgen::config::Error::from)?;
            config
        }
        (None, Some(path)) => Config::load(path)?,
        (None, None) => Config::default(),
    };

    if let Some(path) = cli.hosts_file.or_else(|| generation.hosts_file.clone()) {
        generation.address_pool = hosts::load(&path)?;
        info!(
            "Loaded {count} hosts from {path}",
            count = generation.address_pool.len(),
            path = path.display()
        );
        generation.hosts_file = Some(path);
    }

    let seed = cli.seed.unwrap_or_else(default_seed);
    info!("Random seed {seed}");

    Ok(emitter::Config {
        collector: SocketAddrV4::new(cli.address, cli.port),
        seed,
        capture_path: cli.output,
        pdu_limit: cli.pdu_count,
        generation,
    })
}

async fn inner_main(
    config: emitter::Config,
    prometheus_addr: Option<SocketAddr>,
) -> Result<(), Error> {
    if let Some(addr) = prometheus_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Prometheus metrics exposed on {addr}");
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let emitter = emitter::Emitter::new(config, shutdown_rx)?;
    let mut emitter_handle = tokio::spawn(emitter.spin());

    let joined = tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("received ctrl-c");
            None
        },
        res = &mut emitter_handle => Some(res),
    };
    let joined = match joined {
        Some(res) => res,
        None => {
            // The emitter may already be gone, leaving no receiver.
            let _ = shutdown_tx.send(());
            emitter_handle.await
        }
    };

    match joined? {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("Emitter shut down unexpectedly: {err}");
            Err(Error::Emitter(err))
        }
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(false)
        .finish()
        .init();

    let cli = Cli::parse();
    let version = env!("CARGO_PKG_VERSION");
    info!("Starting nfgen {version} run.");

    let prometheus_addr = cli.prometheus_addr;
    let config = get_config(cli, None)?;

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(inner_main(config, prometheus_addr));
    info!("Bye. :)");
    res
}
