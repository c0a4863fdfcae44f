//! Axum REST handlers for the campaign, data, dashboard and assist APIs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use reach_delivery::StartOutcome;
use reach_segmentation::{parse_natural_language, suggest_messages};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::auth::Owner;
use crate::campaigns::CampaignService;
use crate::dashboard::DashboardService;
use crate::error::{ApiError, ApiResult};
use crate::ingest::DataService;
use crate::models::*;
use reach_core::config::AppConfig;
use reach_core::types::{Campaign, CommunicationLog};
use reach_core::{
    CampaignRepository, CommunicationLogRepository, CustomerRepository, OrderRepository,
};
use reach_delivery::DeliveryOrchestrator;
use reach_segmentation::{RuleCompiler, SegmentEvaluator};

/// Shared handler state.
#[derive(Clone)]
pub struct ManagementState {
    pub campaigns: Arc<CampaignService>,
    pub data: Arc<DataService>,
    pub dashboard: Arc<DashboardService>,
    pub node_id: String,
    pub start_time: Instant,
}

impl ManagementState {
    /// Wire the services over one store implementing every repository.
    pub fn new<S>(config: &AppConfig, store: Arc<S>) -> Self
    where
        S: CustomerRepository
            + OrderRepository
            + CampaignRepository
            + CommunicationLogRepository
            + 'static,
    {
        let orchestrator = Arc::new(DeliveryOrchestrator::new(
            store.clone(),
            store.clone(),
            config.delivery.clone(),
        ));
        let campaigns = CampaignService::new(
            store.clone(),
            store.clone(),
            RuleCompiler::new(config.segmentation.group_join),
            SegmentEvaluator::new(store.clone(), config.segmentation.preview_limit),
            orchestrator,
        );
        Self {
            campaigns: Arc::new(campaigns),
            data: Arc::new(DataService::new(store.clone(), store.clone())),
            dashboard: Arc::new(DashboardService::new(store.clone(), store.clone(), store)),
            node_id: config.node_id.clone(),
            start_time: Instant::now(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<DeliveryOrchestrator> {
        self.campaigns.orchestrator()
    }
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn preview_audience(
    State(state): State<ManagementState>,
    _owner: Owner,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let preview = state.campaigns.preview(&req.rules).await?;
    Ok(Json(PreviewResponse {
        count: preview.count,
        preview: preview.sample,
    }))
}

// ─── Rule and message assist ───────────────────────────────────────────────

const RULES_SOURCE: &str = "Pattern-matching";
const MESSAGES_SOURCE: &str = "Template-based";

pub async fn convert_rules(
    _owner: Owner,
    Json(req): Json<ConvertRulesRequest>,
) -> ApiResult<Json<ConvertRulesResponse>> {
    let prompt = req
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Prompt is required"))?;
    let rules = parse_natural_language(&prompt);
    metrics::counter!("reach.rules.converted").increment(1);
    Ok(Json(ConvertRulesResponse {
        success: true,
        confidence: if rules.is_empty() { 0.5 } else { 0.9 },
        rules,
        original_prompt: prompt,
        source: RULES_SOURCE,
    }))
}

pub async fn generate_messages(
    _owner: Owner,
    Json(req): Json<GenerateMessagesRequest>,
) -> ApiResult<Json<GenerateMessagesResponse>> {
    let rules = req
        .rules
        .ok_or_else(|| ApiError::validation("Rules array is required"))?;
    let objective = req
        .campaign_objective
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| "engagement".to_string());
    metrics::counter!("reach.messages.suggested").increment(1);
    Ok(Json(GenerateMessagesResponse {
        success: true,
        messages: suggest_messages(&rules),
        objective,
        rules_analyzed: rules.len(),
        source: MESSAGES_SOURCE,
    }))
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn create_campaign(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<CreateCampaignResponse>)> {
    let campaign = state.campaigns.create(&owner, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateCampaignResponse {
            success: true,
            campaign: CampaignCreated {
                id: campaign.id,
                name: campaign.name,
                audience_size: campaign.audience_size,
                status: campaign.status,
                created_at: campaign.created_at,
            },
        }),
    ))
}

pub async fn list_campaigns(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<Vec<CampaignSummary>>> {
    let campaigns = state.campaigns.list(&owner, q.page, q.limit).await?;
    Ok(Json(campaigns.into_iter().map(CampaignSummary::from).collect()))
}

pub async fn get_campaign(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.campaigns.get(&owner, id).await?))
}

pub async fn trigger_delivery(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeliveryTriggered>> {
    let outcome = state.campaigns.trigger(&owner, id).await?;
    let (message, run_id) = match outcome {
        StartOutcome::Started { run_id } => ("Delivery triggered", Some(run_id)),
        StartOutcome::NothingToDeliver => ("Nothing to deliver", None),
    };
    Ok(Json(DeliveryTriggered {
        message: message.to_string(),
        campaign_id: id,
        run_id,
    }))
}

pub async fn cancel_delivery(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeliveryCancelled>> {
    let cancelled = state.campaigns.cancel(&owner, id).await?;
    Ok(Json(DeliveryCancelled {
        campaign_id: id,
        cancelled,
    }))
}

pub async fn reconcile_stats(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReconcileResponse>> {
    let delivery_stats = state.campaigns.reconcile(&owner, id).await?;
    Ok(Json(ReconcileResponse {
        campaign_id: id,
        delivery_stats,
    }))
}

pub async fn campaign_logs(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommunicationLog>>> {
    Ok(Json(state.campaigns.logs(&owner, id).await?))
}

// ─── Data ingestion ────────────────────────────────────────────────────────

pub async fn ingest_customers(
    State(state): State<ManagementState>,
    _owner: Owner,
    Json(Batch(records)): Json<Batch<Value>>,
) -> Json<IngestResponse<CustomerResult>> {
    Json(state.data.upsert_customers(records).await)
}

pub async fn ingest_orders(
    State(state): State<ManagementState>,
    _owner: Owner,
    Json(Batch(records)): Json<Batch<Value>>,
) -> Json<IngestResponse<OrderResult>> {
    Json(state.data.ingest_orders(records).await)
}

pub async fn list_customers(
    State(state): State<ManagementState>,
    _owner: Owner,
    Query(q): Query<CustomerQuery>,
) -> ApiResult<Json<CustomerList>> {
    Ok(Json(state.data.list_customers(&q).await?))
}

pub async fn list_orders(
    State(state): State<ManagementState>,
    _owner: Owner,
    Query(q): Query<OrderQuery>,
) -> ApiResult<Json<OrderList>> {
    Ok(Json(state.data.list_orders(&q).await?))
}

pub async fn data_stats(
    State(state): State<ManagementState>,
    _owner: Owner,
) -> ApiResult<Json<DataStats>> {
    Ok(Json(state.data.stats().await?))
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

pub async fn dashboard_stats(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.stats(&owner).await?))
}

pub async fn dashboard_analytics(
    State(state): State<ManagementState>,
    Owner(owner): Owner,
    Query(q): Query<AnalyticsQuery>,
) -> ApiResult<Json<DashboardAnalytics>> {
    Ok(Json(state.dashboard.analytics(&owner, q.period).await?))
}

// ─── Operational ───────────────────────────────────────────────────────────

/// GET /health
pub async fn health_check(State(state): State<ManagementState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_runs: state.campaigns.orchestrator().registry().len(),
    })
}

/// GET /ready
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
