//! chatrelay daemon - TCP chat relay server
//!
//! Accepts chat clients, asks each for a nickname and relays every message
//! unit it receives to all connected clients.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default 127.0.0.1:55555
//! chatrelayd
//!
//! # Custom bind address
//! chatrelayd --host 0.0.0.0 --port 6000
//!
//! # Settings from a file, overridden by environment
//! CHATRELAY_PORT=7000 chatrelayd --config /etc/chatrelay.toml
//!
//! # Enable debug logging
//! RUST_LOG=chatrelayd=debug chatrelayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown (all clients disconnected)

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatrelayd::config::RelayConfig;
use chatrelayd::registry::spawn_registry;
use chatrelayd::server::{RelayServer, ShutdownHandle};

/// chatrelay server - relays messages between connected clients
#[derive(Parser, Debug)]
#[command(name = "chatrelayd", version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config and CHATRELAY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config and CHATRELAY_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Builds the effective config: defaults, file, environment, flags.
fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };

    config.apply_env()?;

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatrelayd=info".parse()?),
        )
        .init();

    let config = load_config(&args).context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chatrelay server starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown = ShutdownHandle::new(cancel_token.clone());
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        shutdown.shutdown();
    });

    if let Err(e) = RelayServer::start(config, spawn_registry(), cancel_token).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
