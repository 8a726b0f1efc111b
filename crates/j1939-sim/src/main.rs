//! j1939sim - run a simulated J1939 node.
//!
//! Usage:
//!   j1939sim
//!   j1939sim --config node.json --mode all
//!   j1939sim --catalog J1939.json --once
//!   j1939sim --mode per-pgn --duration 10
//!   j1939sim --list

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use j1939_protocol::ProtocolCatalog;
use j1939_sim::{LogTransport, SimConfig, SimulatedNode, DEFAULT_LOG_FILTER};
use j1939_tx::GlobalTxMode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Send nothing
    Stop,
    /// Send every PGN
    All,
    /// Let each PGN's configured mode decide
    PerPgn,
}

impl From<ModeArg> for GlobalTxMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stop => GlobalTxMode::StopAll,
            ModeArg::All => GlobalTxMode::TransmitAll,
            ModeArg::PerPgn => GlobalTxMode::PerEntry,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "j1939sim")]
#[command(about = "Simulate a J1939 node transmitting periodic PGNs")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/j1939sim/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol catalog JSON, overriding the config
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Global transmit mode, overriding the config
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Send every PGN once at startup
    #[arg(long)]
    once: bool,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Print the catalog's transmittable PGNs and SPNs, then exit
    #[arg(long)]
    list: bool,
}

fn print_catalog(catalog: &ProtocolCatalog) {
    for pgn in catalog.iter() {
        println!(
            "PGN {} {} ({} bytes, priority {}, every {:?})",
            pgn.pgn, pgn.acronym, pgn.length, pgn.priority, pgn.period
        );
        for spn in pgn.spns() {
            println!("  SPN {} {}", spn.spn, spn.name);
            if spn.is_discrete() {
                if let Some(values) = spn.discrete_values() {
                    for label in values.labels() {
                        println!("    {}", label);
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => SimConfig::default_path()?,
    };
    let mut config = SimConfig::load_or_bootstrap(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    if let Some(catalog) = args.catalog {
        config.catalog = catalog;
    }

    let default_filter = config
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Using config {}", config_path.display());
    let catalog = ProtocolCatalog::load(&config.catalog)
        .with_context(|| format!("loading catalog {}", config.catalog.display()))?;
    for rejected in catalog.rejected_pgns() {
        warn!("PGN {} not transmittable: {}", rejected.pgn, rejected.reason);
    }
    for rejected in catalog.rejected_spns() {
        warn!(
            "SPN {} of PGN {} not transmittable: {}",
            rejected.spn, rejected.pgn, rejected.reason
        );
    }
    if args.list {
        print_catalog(&catalog);
        return Ok(());
    }

    let transport = Arc::new(LogTransport::new());
    let node = SimulatedNode::from_config(&config, Arc::new(catalog), transport.clone())?;

    if let Some(mode) = args.mode {
        node.set_global_mode(mode.into())?;
    }
    if args.once {
        node.transmit_all_once()?;
    }

    for pgn in node.pgns() {
        for reading in node.readings(pgn)? {
            info!("PGN {} {}", pgn, reading);
        }
    }

    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupted");
        }
    }

    node.shutdown().await;
    info!("Sent {} frames", transport.frames_sent());
    Ok(())
}
