//! mdns-relay - Entry point.
//!
//! Captures tagged mDNS traffic on a bridge interface and relays discovery
//! between mapped clients and target devices living on separate VLANs.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mdns_relay::config::Config;
use mdns_relay::forward::ForwardingEngine;
use mdns_relay::mapping::load_mappings;
use mdns_relay::network::{
    PacketRewriter, PcapCapture, bridge_identity, capture_filter, find_interface,
};
use mdns_relay::relay::{Relay, RelayStats, run_decoder};

/// mDNS VLAN relay - forwards discovery between mapped clients and devices.
#[derive(Parser, Debug)]
#[command(name = "mdns-relay")]
#[command(version)]
#[command(about = "Relays mDNS discovery between isolated VLANs")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Path to the JSON states file pairing clients with target devices.
    #[arg(long)]
    states: PathBuf,

    /// Log the decoded layers of every frame before it is forwarded.
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_summary(stats: &RelayStats) {
    info!(
        received = stats.received,
        forwarded_queries = stats.forwarded_queries,
        forwarded_responses = stats.forwarded_responses,
        dropped = stats.dropped(),
        rewrite_failures = stats.rewrite_failures,
        send_failures = stats.send_failures,
        "relay summary"
    );
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(&args.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config.display()
        )
    })?;

    // Initialize metrics (must be done early, before any metrics are recorded)
    mdns_relay::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    let mappings = load_mappings(&args.states).with_context(|| {
        format!("Failed to load mappings from {}", args.states.display())
    })?;
    if mappings.is_empty() {
        warn!("No valid client/device mappings, nothing will be relayed");
    }
    for (client, device) in mappings.iter() {
        debug!(%client, %device, "mapping");
    }

    let interface =
        find_interface(&config.interface).context("Failed to find network interface")?;
    let bridge_mac =
        bridge_identity(&interface).context("Failed to resolve bridge hardware address")?;
    info!("Listening on interface: {} ({bridge_mac})", interface.name);
    info!(
        "Target VLAN: {}, client VLAN: {}, query source: {}",
        config.target_vlan, config.client_vlan, config.spoof_source_ip
    );

    let filter = capture_filter(bridge_mac);
    info!("Capture filter: {filter}");
    let (capture, sender) =
        PcapCapture::new(&interface.name, &filter).context("Failed to open packet capture")?;

    let engine = ForwardingEngine::new(
        Arc::new(mappings),
        config.target_vlan,
        config.client_vlan,
        config.spoof_source_ip,
    );
    let relay = Relay::new(engine, PacketRewriter::new(bridge_mac), sender).with_dump(args.debug);

    let (envelope_tx, envelope_rx) = mpsc::channel(config.channel_capacity);
    let running = Arc::new(AtomicBool::new(true));

    let decoder_running = Arc::clone(&running);
    let mut decoder = tokio::task::spawn_blocking(move || {
        run_decoder(capture, envelope_tx, decoder_running)
    });
    let forwarder = tokio::spawn(relay.run(envelope_rx));

    let decoded = tokio::select! {
        result = &mut decoder => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down...");
            running.store(false, Ordering::SeqCst);
            decoder.await
        }
    };

    // The decoder dropped its queue sender, so the loop drains and returns.
    let stats = forwarder.await.context("Forwarding loop failed")?;
    log_summary(&stats);

    let queued = decoded
        .context("Decoder task failed")?
        .context("Packet capture failed")?;
    debug!(queued, "decoder stopped");

    info!("Shutdown complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);
    run(args).await
}
