//! CLI entry point for the sensor node.
//!
//! # Usage
//!
//! Send one payload:
//! ```bash
//! sensor_node send '{"t":21.5}' --no-custody --lifetime 3600
//! ```
//!
//! Relay readings produced by the sensing loop, one JSON object per line:
//! ```bash
//! sensing_loop | sensor_node --config config/sensor_node.toml relay
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dtn_client::message::parse_lifetime;
use sensor_node::config::DEFAULT_CONFIG_PATH;
use sensor_node::{relay_readings, telemetry, CommunicationModule, NodeConfig};
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "sensor_node")]
#[command(about = "Deliver sensor readings as DTN bundles through the local daemon", long_about = None)]
struct Cli {
    /// Configuration file (TOML); SENSOR_NODE_* environment variables override it
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single JSON payload and exit
    Send {
        /// JSON payload text
        payload: String,

        /// Request custody transfer (default comes from configuration)
        #[arg(long, overrides_with = "no_custody")]
        custody: bool,

        /// Do not request custody transfer, even if configuration does
        #[arg(long, overrides_with = "custody")]
        no_custody: bool,

        /// Bundle lifetime in seconds (default comes from configuration)
        #[arg(long, value_parser = lifetime_arg)]
        lifetime: Option<u64>,
    },

    /// Read newline-delimited readings from stdin and send each one
    Relay,
}

fn lifetime_arg(input: &str) -> Result<u64, String> {
    parse_lifetime(input).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = NodeConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    telemetry::init_from_config(&config).map_err(|e| anyhow!(e))?;

    info!(
        node_id = %config.node.id,
        daemon = %config.daemon.address(),
        destination = %config.daemon.destination_eid,
        "sensor node starting"
    );

    let mut comms = CommunicationModule::new(&config);
    let result = match cli.command {
        Commands::Send {
            payload,
            custody,
            no_custody,
            lifetime,
        } => send_once(&mut comms, payload, custody_override(custody, no_custody), lifetime).await,
        Commands::Relay => relay(&mut comms, &config.node.id).await,
    };

    comms.close_connections().await;
    result
}

/// `None` leaves the configured default in place.
fn custody_override(custody: bool, no_custody: bool) -> Option<bool> {
    match (custody, no_custody) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

async fn send_once(
    comms: &mut CommunicationModule,
    payload: String,
    custody: Option<bool>,
    lifetime_secs: Option<u64>,
) -> Result<()> {
    let message = comms.text_message(payload, custody, lifetime_secs)?;

    comms.connect().await?;
    comms.send_message(message).await?;
    info!("payload delivered to DTN daemon");
    Ok(())
}

async fn relay(comms: &mut CommunicationModule, node_id: &str) -> Result<()> {
    comms.connect().await?;
    relay_readings(comms, node_id, BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}
