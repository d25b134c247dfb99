//! List every node in the account with its addresses and forwarding rules
//!
//! ```text
//! CLOUDSTACK_API_KEY=... CLOUDSTACK_SECRET_KEY=... CLOUDSTACK_HOST=cloud.example.com \
//!     cargo run --bin list_nodes
//! ```

use anyhow::{Context, Result};
use cloudnode_core::{CloudStackConfig, NodeDriver};
use cloudnode_provider_cloudstack::CloudStackDriver;
use std::env;
use tracing::{Level, info};
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

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(log_level()).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = CloudStackConfig::from_env().context("Configuration error")?;
    let driver = CloudStackDriver::new(&config)?;
    info!("Listing nodes at {}", config.endpoint());

    let nodes = driver.list_nodes().await?;
    for node in &nodes {
        println!(
            "{}  {:<20} {:<10} zone={}",
            node.id,
            node.name.as_deref().unwrap_or("-"),
            node.state,
            node.zone_id().unwrap_or("-")
        );
        println!("    private: {}", node.private_ips.join(", "));
        println!("    public:  {}", node.public_ips.join(", "));
        for rule in &node.ip_forwarding_rules {
            let ports = match rule.end_port {
                Some(end) if end != rule.start_port => format!("{}-{}", rule.start_port, end),
                _ => rule.start_port.to_string(),
            };
            println!("    rule {}: {} {}/{}", rule.id, rule.address, rule.protocol, ports);
        }
    }

    info!("{} node(s)", nodes.len());
    Ok(())
}
