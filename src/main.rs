//! Smart Router server entry point.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_router::config::RouterConfig;
use smart_router::server::{AppState, app};

#[derive(Debug, Parser)]
#[command(name = "smart-router", version, about = "Complexity-routing proxy for LLM backends")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SMART_ROUTER_CONFIG", default_value = "smart-router.toml")]
    config: PathBuf,

    /// Listen port, overriding the configured value.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = RouterConfig::load(&cli.config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("smart_router={},tower_http=info", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        backend = %config.connection.base_url,
        "starting smart-router"
    );

    let port = cli.port.unwrap_or(config.server.port);
    let state = Arc::new(AppState::new(config, cli.config.clone()));

    // Routing cannot work with an empty registry, so the first fetch is fatal.
    let registry = state
        .refresh_registry(true)
        .await
        .context("initial model discovery failed")?;
    if registry.is_empty() {
        anyhow::bail!("backend reported no usable chat models");
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!(port, models = registry.len(), "listening");

    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
