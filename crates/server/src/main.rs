//! Diana - Artemis protocol tools
//!
//! `diana proxy` relays and logs a live session, `diana stream` prints
//! everything a server sends.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diana_config::ProxyConfig;
use diana_network::{Client, Proxy};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diana", version, about = "Artemis bridge simulator protocol tools")]
struct Cli {
    /// Options file (defaults to diana.cfg when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Relay clients to a server, logging every packet.
    Proxy {
        /// Port to accept clients on.
        proxy_port: u16,
        /// Server address (DNS, IPv4 or IPv6).
        address: String,
        /// Server port.
        port: Option<u16>,
    },
    /// Connect to a server and print each packet it sends.
    Stream {
        /// Server address (DNS, IPv4 or IPv6).
        address: String,
        /// Server port.
        port: Option<u16>,
        /// Print packets as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ProxyConfig::load_from_file(path)
            .with_context(|| format!("load {}", path.display()))?,
        None => ProxyConfig::load_default().context("load diana.cfg")?,
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("parse log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Proxy {
            proxy_port,
            address,
            port,
        } => {
            config.listen_port = proxy_port;
            config.server_host = address;
            if let Some(port) = port {
                config.server_port = port;
            }
            run_proxy(&config).await
        }
        Command::Stream {
            address,
            port,
            json,
        } => {
            config.server_host = address;
            if let Some(port) = port {
                config.server_port = port;
            }
            run_stream(&config, json).await
        }
    }
}

async fn run_proxy(config: &ProxyConfig) -> Result<()> {
    config.display();
    let proxy = Proxy::from_config(config).await.context("start proxy")?;

    tokio::select! {
        result = proxy.run() => result.context("proxy")?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    if let Some(tracker) = proxy.tracker() {
        info!("Tracked {} objects at shutdown", tracker.lock().len());
    }
    Ok(())
}

async fn run_stream(config: &ProxyConfig, json: bool) -> Result<()> {
    let mut client = Client::connect(&config.server_host, config.server_port)
        .await
        .with_context(|| format!("connect to {}", config.server_address()))?;

    loop {
        let packet = tokio::select! {
            packet = client.next_packet() => packet.context("read packet")?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(packet) = packet else {
            info!("Server closed the connection");
            break;
        };

        if json {
            println!("{}", serde_json::to_string(&packet)?);
        } else {
            println!("{:?}", packet);
        }
    }
    Ok(())
}
