//! API router — campaigns, data ingestion, dashboard, assist endpoints and
//! health probes.

use crate::handlers::{self, ManagementState};
use axum::routing::{get, post};
use axum::Router;

/// Build the router with all endpoints. Middleware is layered on by the
/// server.
pub fn management_router(state: ManagementState) -> Router {
    Router::new()
        // Campaigns
        .route("/api/campaigns", get(handlers::list_campaigns).post(handlers::create_campaign))
        .route("/api/campaigns/preview", post(handlers::preview_audience))
        .route("/api/campaigns/:id", get(handlers::get_campaign))
        .route("/api/campaigns/:id/trigger-delivery", post(handlers::trigger_delivery))
        .route("/api/campaigns/:id/cancel-delivery", post(handlers::cancel_delivery))
        .route("/api/campaigns/:id/reconcile", post(handlers::reconcile_stats))
        .route("/api/campaigns/:id/logs", get(handlers::campaign_logs))
        // Data
        .route("/api/data/customers", get(handlers::list_customers).post(handlers::ingest_customers))
        .route("/api/data/orders", get(handlers::list_orders).post(handlers::ingest_orders))
        .route("/api/data/stats", get(handlers::data_stats))
        // Dashboard
        .route("/api/dashboard/stats", get(handlers::dashboard_stats))
        .route("/api/dashboard/analytics", get(handlers::dashboard_analytics))
        // Rule and message assist
        .route("/api/ai/convert-rules", post(handlers::convert_rules))
        .route("/api/ai/generate-messages", post(handlers::generate_messages))
        // Operational
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .route("/live", get(handlers::liveness))
        .with_state(state)
}
