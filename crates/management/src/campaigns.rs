//! Campaign lifecycle: preview, creation with dispatch, and delivery control.

use reach_core::store::{CampaignRepository, CommunicationLogRepository, Page};
use reach_core::types::{Campaign, CommunicationLog, DeliveryStats, Rule};
use reach_core::{ReachError, ReachResult};
use reach_delivery::{dispatch, DeliveryOrchestrator, StartOutcome};
use reach_segmentation::{RuleCompiler, SegmentEvaluator, SegmentPreview};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::CreateCampaignRequest;

pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    logs: Arc<dyn CommunicationLogRepository>,
    compiler: RuleCompiler,
    evaluator: SegmentEvaluator,
    orchestrator: Arc<DeliveryOrchestrator>,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        logs: Arc<dyn CommunicationLogRepository>,
        compiler: RuleCompiler,
        evaluator: SegmentEvaluator,
        orchestrator: Arc<DeliveryOrchestrator>,
    ) -> Self {
        Self {
            campaigns,
            logs,
            compiler,
            evaluator,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Arc<DeliveryOrchestrator> {
        &self.orchestrator
    }

    pub async fn preview(&self, rules: &[Rule]) -> ReachResult<SegmentPreview> {
        let predicate = self.compiler.compile(rules);
        self.evaluator.evaluate(&predicate).await
    }

    /// Validate, size the audience, queue one log record per recipient,
    /// persist the campaign and start delivery. The campaign is only stored
    /// once its log is written, so a failed dispatch leaves nothing visible.
    pub async fn create(&self, owner: &str, req: CreateCampaignRequest) -> ReachResult<Campaign> {
        let (name, rules, message) = validate(req.name, req.rules, req.message)?;

        let predicate = self.compiler.compile(&rules);
        let recipients = self.evaluator.recipients(&predicate).await?;
        let audience = recipients.len() as u64;
        if let Some(estimate) = req.audience_size.filter(|n| *n != audience) {
            warn!(estimate, audience, "Client audience estimate differs, using evaluated size");
        }

        let campaign = Campaign::new(owner, name, rules, message, audience);
        dispatch(self.logs.as_ref(), &campaign, &recipients).await?;
        let campaign = self.campaigns.insert_campaign(campaign).await?;

        metrics::counter!("reach.campaigns.created").increment(1);
        info!(
            campaign_id = %campaign.id,
            owner,
            audience,
            "Campaign created"
        );

        // Delivery trouble is recorded on the campaign, not returned here.
        if let Err(e) = self.orchestrator.start(campaign.id).await {
            warn!(campaign_id = %campaign.id, error = %e, "Delivery run not started");
        }
        Ok(campaign)
    }

    pub async fn list(&self, owner: &str, page: usize, limit: usize) -> ReachResult<Vec<Campaign>> {
        let page = Page {
            skip: page.max(1).saturating_sub(1).saturating_mul(limit),
            limit: Some(limit),
            newest_first: true,
        };
        self.campaigns.list_campaigns(owner, page).await
    }

    /// A campaign owned by `owner`; other users' campaigns read as missing.
    pub async fn get(&self, owner: &str, id: Uuid) -> ReachResult<Campaign> {
        self.campaigns
            .get_campaign(id)
            .await?
            .filter(|c| c.user_id == owner)
            .ok_or_else(|| ReachError::not_found("campaign", id))
    }

    pub async fn trigger(&self, owner: &str, id: Uuid) -> ReachResult<StartOutcome> {
        let campaign = self.get(owner, id).await?;
        info!(campaign_id = %campaign.id, "Manual delivery trigger");
        self.orchestrator.start(campaign.id).await
    }

    pub async fn cancel(&self, owner: &str, id: Uuid) -> ReachResult<bool> {
        let campaign = self.get(owner, id).await?;
        Ok(self.orchestrator.cancel(campaign.id))
    }

    pub async fn reconcile(&self, owner: &str, id: Uuid) -> ReachResult<DeliveryStats> {
        let campaign = self.get(owner, id).await?;
        self.orchestrator.aggregator().recompute(campaign.id).await
    }

    pub async fn logs(&self, owner: &str, id: Uuid) -> ReachResult<Vec<CommunicationLog>> {
        let campaign = self.get(owner, id).await?;
        self.logs.logs_for_campaign(campaign.id).await
    }
}

fn validate(
    name: Option<String>,
    rules: Option<Vec<Rule>>,
    message: Option<String>,
) -> ReachResult<(String, Vec<Rule>, String)> {
    let name = name.filter(|n| !n.trim().is_empty());
    let message = message.filter(|m| !m.trim().is_empty());
    match (name, rules, message) {
        (Some(name), Some(rules), Some(message)) => Ok((name, rules, message)),
        _ => Err(ReachError::Validation(
            "name, rules and message are required".to_string(),
        )),
    }
}
