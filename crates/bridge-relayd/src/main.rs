//! relayd - Bridge Relay Daemon
//!
//! Entry point for the relayd daemon.

use anyhow::Context;
use bridge_relayd::{
    ChannelControlPlane, ChannelSink, InterfaceTable, MacTable, Relay, RelayConfig, RelayDaemon,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Transparent Ethernet bridge relay
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = "/etc/bridge/relayd.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Cooperate with an external STP/RSTP process regardless of the config file
    #[arg(long)]
    stp_aware: bool,

    /// Learning table aging sweep interval in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    aging_interval: u64,
}

/// Initializes tracing/logging subsystem
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RelayConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if args.stp_aware {
        config.stp_aware = true;
    }

    info!("Ports: {}", config.ports.len());
    info!("STP aware: {}", config.stp_aware);
    info!("MAC aging time: {}s", config.mac_table.aging_time_secs);

    let ports = Arc::new(InterfaceTable::from_config(&config.ports));
    let mac_table = Arc::new(MacTable::with_aging(config.mac_table.aging_time()));
    let (sink, mut transmitted) = ChannelSink::new();
    let (control, mut bpdus) = ChannelControlPlane::new();

    let relay = Relay::new(
        &config,
        ports,
        mac_table.clone(),
        Arc::new(sink),
        Arc::new(control),
    )
    .context("creating relay")?;

    // Physical transmission and the STP process are external; without them
    // attached the outputs are only traced.
    tokio::spawn(async move {
        while let Some((port, frame)) = transmitted.recv().await {
            debug!("tx {} {} -> {} ({} bytes)", port, frame.src, frame.dest, frame.payload.len());
        }
    });
    tokio::spawn(async move {
        while let Some(bpdu) = bpdus.recv().await {
            debug!("bpdu from {} on {}", bpdu.src, bpdu.arrival_port);
        }
    });

    let (daemon, _handle) = RelayDaemon::new(Arc::new(relay), config.event_queue_depth);
    let daemon = daemon.with_aging(mac_table, Duration::from_millis(args.aging_interval));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };

    let stats = daemon.run(shutdown).await?;
    info!("Final statistics: {}", serde_json::to_string(&stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting relayd ---");

    match run(args).await {
        Ok(()) => {
            info!("relayd exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("relayd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
