//! Relay entry point: forwards `/api/*` POSTs to the fixed backend.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use airemover::{
    config::Config,
    relay::{self, RelayState},
};

/// Console logging; `RUST_LOG` wins over the default level.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let mut cfg = Config::load_or_default(Path::new("config.toml"))?;
    cfg.apply_relay_env();

    let listener = TcpListener::bind(&cfg.relay.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.relay.listen))?;

    relay::serve(listener, RelayState::from_config(&cfg.relay), shutdown_signal()).await?;
    tracing::info!("relay stopped");
    Ok(())
}
