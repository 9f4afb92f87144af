//! Epoch Job Agent
//!
//! Once per staking cycle, shortly before the boundary, withdraws accrued
//! delegation rewards and re-delegates free balance for every managed
//! account:
//! - Tracks the cycle from the node's block height
//! - Gates each job so it fires at most once per cycle
//! - Fans every batch out over the accounts under a watchdog

mod api;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use epochjob_runtime::{metrics, AccountRegistry, CycleScheduler, RuntimeError};
use epochjob_sdk::{ChainClient, RpcClient};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "epochjob-agent", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "EPOCHJOB_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and derive every account, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Epoch Job Agent");

    // Load configuration
    let config = config::Config::load(&args.config)?;
    if config.dst_addr.is_some() {
        warn!("dstAddr is set but not used");
    }

    // Key material is validated once up front; a bad entry is fatal
    let registry = AccountRegistry::new(config.arp.clone(), config.addrs.clone())
        .context("Invalid account configuration")?;

    if args.check {
        for (index, account) in registry.derive_all()?.iter().enumerate() {
            info!(index, address = %account.bech32, node_id = %account.node_id, "account ok");
        }
        info!(accounts = registry.len(), "configuration ok");
        return Ok(());
    }

    // The node must answer before anything is scheduled
    let client =
        RpcClient::with_options(&config.raw_url, &config.rpc_namespace, config.rpc_timeout())
            .context("Failed to build RPC client")?;
    let height = client
        .block_number()
        .await
        .map_err(|e| RuntimeError::NodeUnreachable(format!("{}: {e}", client.url())))?;
    info!(url = client.url(), height, "connected to node");
    match client.network_id().await {
        Ok(id) if id != config.chain_id => {
            warn!(network_id = id, chain_id = config.chain_id, "node network id differs from chainId");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to read network id"),
    }

    // Initialize metrics
    let metrics_registry = metrics::init_metrics().context("Failed to register metrics")?;
    if let Some(port) = config.metrics_port {
        tokio::spawn(api::run_api_server(port, metrics_registry));
    }

    let scheduler = Arc::new(CycleScheduler::new(
        Arc::new(client),
        registry,
        config.runtime(),
    ));
    scheduler.start().await;

    wait_for_signal().await?;
    info!("Received shutdown signal");

    scheduler.stop().await;
    info!("Shutting down Epoch Job Agent");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")
}
