//! Tunnel manager daemon
//!
//! Serves the control API used by the portal to open quick tunnels, look up
//! named tunnel routes and build direct URLs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tm_core::config::{self, ManagerConfig};
use tm_orchestrator::{build_router, ManagerState, TunnelManager};

#[derive(Parser)]
#[command(name = "tunnel-manager")]
#[command(about = "Quick and named tunnel manager")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config and environment)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tunnel manager starting...");

    // Load configuration
    let mut config: ManagerConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                ManagerConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            ManagerConfig::default()
        }
    };

    config.apply_process_env();
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Tunnel binary: {:?}, named tunnel: {}",
        config.tunnel_bin,
        if config.named_tunnel_enabled() { "enabled" } else { "disabled" }
    );

    let bind_addr = config.bind_address.clone();
    let state = Arc::new(ManagerState::new(config).context("Failed to initialize state")?);
    let manager = TunnelManager::new(Arc::clone(&state));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Control API listening on {}", bind_addr);

    manager.start().await;

    let shutdown = cancel.clone();
    let serve_result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    manager.shutdown().await;
    serve_result.context("Control API server failed")?;

    tracing::info!("Tunnel manager shutdown complete");
    Ok(())
}
