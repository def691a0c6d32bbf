//! Entry point for the Quortex MCP server.

mod config;
mod mcp;
mod server;

use anyhow::Context as _;
use clap::Parser as _;
use config::Cli;
use server::QuortexServer;
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let (bind, config) = cli.into_config();

    let server = Arc::new(QuortexServer::build(&config).context("build server")?);
    tracing::info!(
        capabilities = server.capability_count(),
        "Quortex MCP server ready"
    );

    let app = mcp::router(server);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    tracing::info!(addr = %bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    Ok(())
}
