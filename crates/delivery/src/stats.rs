//! Delivery stats aggregator — counters derived from the communication log.

use reach_core::store::{CampaignRepository, CommunicationLogRepository};
use reach_core::types::{DeliveryStats, DeliveryStatus};
use reach_core::ReachResult;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct StatsAggregator {
    campaigns: Arc<dyn CampaignRepository>,
    logs: Arc<dyn CommunicationLogRepository>,
}

impl StatsAggregator {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        logs: Arc<dyn CommunicationLogRepository>,
    ) -> Self {
        Self { campaigns, logs }
    }

    /// Count the campaign's log records by status. Read-only.
    pub async fn tally(&self, campaign_id: Uuid) -> ReachResult<DeliveryStats> {
        let counts = self.logs.count_by_status(campaign_id).await?;
        let count = |s: DeliveryStatus| counts.get(&s).copied().unwrap_or(0);
        Ok(DeliveryStats {
            sent: count(DeliveryStatus::Sent),
            failed: count(DeliveryStatus::Failed),
            pending: count(DeliveryStatus::Pending),
        })
    }

    /// Tally the log and overwrite the campaign's counters with the result.
    /// Status is left alone.
    pub async fn recompute(&self, campaign_id: Uuid) -> ReachResult<DeliveryStats> {
        let stats = self.tally(campaign_id).await?;
        self.campaigns.write_stats(campaign_id, stats).await?;
        info!(
            campaign_id = %campaign_id,
            sent = stats.sent,
            failed = stats.failed,
            pending = stats.pending,
            "Campaign stats recomputed from log"
        );
        Ok(stats)
    }
}
