//! HTTP server — mounts the router with tracing and CORS, and runs the
//! Prometheus exporter on its own port.

use reach_core::config::AppConfig;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::ManagementState;
use crate::router::management_router;

pub struct ApiServer {
    config: AppConfig,
    state: ManagementState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: ManagementState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &ManagementState {
        &self.state
    }

    /// Serve until `shutdown` resolves, then cancel in-flight delivery runs.
    pub async fn start_http<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = management_router(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped, cancelling delivery runs");
        self.state.orchestrator().shutdown().await;
        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
