//! Reach — audience segmentation and staged campaign delivery.
//!
//! Main entry point that loads configuration, wires the store and services
//! and serves the HTTP API until interrupted.

use clap::Parser;
use reach_core::config::AppConfig;
use reach_core::InMemoryStore;
use reach_management::{ApiServer, ManagementState};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "reach-server")]
#[command(about = "Audience segmentation and staged campaign delivery")]
#[command(version)]
struct Cli {
    /// Config file (TOML), merged under environment variables
    #[arg(long, short)]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "REACH__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "REACH__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Milliseconds between delivery steps (overrides config)
    #[arg(long, env = "REACH__DELIVERY__STEP_INTERVAL_MS")]
    step_interval_ms: Option<u64>,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reach=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Reach starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(ms) = cli.step_interval_ms {
        config.delivery.step_interval_ms = ms;
    }
    if cli.no_metrics {
        config.metrics.enabled = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        steps = config.delivery.steps,
        step_interval_ms = config.delivery.step_interval_ms,
        group_join = ?config.segmentation.group_join,
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let state = ManagementState::new(&config, store);
    let api_server = ApiServer::new(config.clone(), state);

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics() {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Reach is ready to serve traffic");

    api_server.start_http(shutdown_signal()).await?;

    info!("Reach stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
