//! ferrite-node — the ferrite full-node binary.
//!
//! Startup sequence:
//!   1. Build the in-memory ledger (genesis block + genesis wallet)
//!   2. Start the gossip overlay and dial any bootstrap peers
//!   3. Optionally mine on an interval so a local network self-drives
//!
//! The HTTP control API for wallet clients is a separate collaborator; it
//! drives the `Node` surface exposed by this crate's library.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use ferrite_core::constants::INITIAL_DIFFICULTY;
use ferrite_node::{LedgerConfig, Node, NodeConfig};

#[derive(Parser, Debug)]
#[command(
    name = "ferrite-node",
    version,
    about = "ferrite node — a small proof-of-work account ledger"
)]
struct Args {
    /// P2P listen port (0 picks an ephemeral port).
    #[arg(long, default_value_t = 8000)]
    p2p_port: u16,

    /// Bootstrap peers as host:port (comma-separated).
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<String>,

    /// Stable node identifier; generated when omitted.
    #[arg(long)]
    node_id: Option<String>,

    /// PoW difficulty override.
    #[arg(long, default_value_t = INITIAL_DIFFICULTY)]
    difficulty: u32,

    /// Mine a block every N seconds.
    #[arg(long)]
    mine_interval: Option<u64>,
}

fn parse_bootstrap(entries: &[String]) -> anyhow::Result<Vec<(String, u16)>> {
    entries
        .iter()
        .map(|entry| {
            let (host, port) = entry
                .rsplit_once(':')
                .with_context(|| format!("bootstrap entry without port: {entry}"))?;
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid bootstrap port in {entry}"))?;
            Ok((host.to_string(), port))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ferrite=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("ferrite node starting");

    // With no peers given, fall back to the conventional local bootstrap
    // set so a handful of default-configured nodes find each other.
    let bootstrap = if args.bootstrap.is_empty() {
        ferrite_p2p::OverlayConfig::default_bootstrap()
    } else {
        parse_bootstrap(&args.bootstrap)?
    };
    let config = NodeConfig {
        node_id: args.node_id,
        bootstrap,
        ledger: LedgerConfig {
            initial_difficulty: args.difficulty,
            ..LedgerConfig::default()
        },
    };

    let node = Arc::new(Node::new(config));
    let port = node
        .start_overlay(args.p2p_port)
        .await
        .context("binding P2P listener")?;
    info!(
        node_id = %node.node_id(),
        p2p_port = port,
        genesis = %node.genesis_address(),
        "node ready"
    );

    if let Some(secs) = args.mine_interval {
        let miner = Arc::clone(&node);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                ticker.tick().await;
                match miner.mine().await {
                    Ok(block) => info!(index = block.index, hash = %block.hash, "mined block"),
                    Err(e) => warn!(error = %e, "mining attempt failed"),
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
