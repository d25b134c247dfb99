//! Give a node a public address and forward a port to it
//!
//! ```text
//! cargo run --bin allocate_address -- <node-id> [protocol] [port]
//! ```
//!
//! Protocol defaults to `tcp` and port to `22`. Ctrl-C abandons the wait
//! for any pending job; the job itself keeps running server-side.

use anyhow::{Context, Result, bail};
use cloudnode_core::{CloudStackConfig, NodeDriver};
use cloudnode_provider_cloudstack::CloudStackDriver;
use std::env;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

fn log_level() -> Level {
    match env::var("CLOUDNODE_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

async fn run(driver: CloudStackDriver, node_id: String, protocol: String, port: u16) -> Result<()> {
    let Some(mut node) = driver.get_node(&node_id).await? else {
        bail!("Node {} not found", node_id);
    };

    let Some(address) = driver.ex_allocate_public_ip(&mut node).await? else {
        bail!("Could not allocate a public address for node {}", node.id);
    };
    println!("{} -> {}", address, node.id);

    match driver
        .ex_add_ip_forwarding_rule(&mut node, &address, &protocol, port, None)
        .await?
    {
        Some(rule) => println!("rule {}: {}/{}", rule.id, rule.protocol, rule.start_port),
        None => warn!("Protocol {} cannot be forwarded; address left without rules", protocol),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(log_level()).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut args = env::args().skip(1);
    let node_id = args
        .next()
        .context("usage: allocate_address <node-id> [protocol] [port]")?;
    let protocol = args.next().unwrap_or_else(|| "tcp".to_string());
    let port: u16 = match args.next() {
        Some(p) => p.parse().with_context(|| format!("Invalid port '{}'", p))?,
        None => 22,
    };

    let config = CloudStackConfig::from_env().context("Configuration error")?;
    let driver = CloudStackDriver::new(&config)?;
    info!("Using {} ({})", config.endpoint(), driver.driver_name());

    tokio::select! {
        result = run(driver, node_id, protocol, port) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; pending jobs continue server-side");
            Ok(())
        }
    }
}
