//! gopkg Node - versioned Go import path gateway.

use anyhow::Context;
use clap::Parser;
use gopkg_node::observability::{init_logging, LogFormat};
use gopkg_node::{create_router, AppState, GatewayConfig, UpstreamClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// gopkg Node - versioned Go import paths on top of a Git host
#[derive(Parser, Debug)]
#[command(name = "gopkg-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (read if it exists)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Listen address, overriding the configuration
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatewayConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let format = args
        .log_format
        .as_deref()
        .map_or(config.log_format, LogFormat::parse);

    init_logging(level, format);

    let hosts = Arc::new(config.hosts()?);
    let upstream = UpstreamClient::new(config.upstream_timeout(), config.credentials())
        .context("building upstream client")?;

    let gateway_url = format!("{}://{}", hosts.gateway_scheme, hosts.gateway_host);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.addr,
        gateway = %gateway_url,
        upstream = %hosts.upstream_url,
        authenticated = config.credentials().is_some(),
        "Starting gopkg gateway"
    );

    let app = create_router(AppState::new(hosts, upstream), config.request_timeout());
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    tracing::info!("gopkg gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
