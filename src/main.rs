//! wakehall server - web dashboard and JSON API for waking LAN devices
//!
//! This binary serves:
//! - `GET  /`                      the embedded dashboard page
//! - `GET  /api/devices`           configured devices with liveness
//! - `POST /api/devices/:id/wake`  wake a device by registry id
//! - `GET  /api/scan`              sweep the local network

mod state;
mod web;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use wakehall_core::config;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "wakehall-server")]
#[command(version)]
#[command(about = "Wake-on-LAN dashboard and API server")]
struct Cli {
    /// Listen address (overrides the config file)
    #[arg(short, long)]
    address: Option<String>,

    /// Listen port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Explicit config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "wakehall_server={log_level},wakehall_core={log_level},tower_http={log_level}"
                )
                .into()
            }),
        )
        .init();

    let config = match &cli.config {
        Some(path) => config::load_file(path)?,
        None => config::load()?,
    };

    let registry = config.registry().context("invalid device configuration")?;
    tracing::info!("{} device(s) configured", registry.len());

    let state = Arc::new(AppState::new(registry));
    let app = web::router(state);

    let bind = format!(
        "{}:{}",
        cli.address.as_deref().unwrap_or(&config.server.bind_address),
        cli.port.unwrap_or(config.server.port),
    );
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid listen address {bind}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
