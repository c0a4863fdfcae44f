//! Delivery orchestrator — drives a campaign from ACTIVE to COMPLETED in
//! timed steps, off the request path.
//!
//! A run first claims the campaign's persisted in-flight marker, so at most
//! one run per campaign exists across the whole store. Each step either
//! writes the planned counters directly or, when the campaign has a full
//! communication log, resolves log records and writes the tallied result.
//! Any failure marks the campaign FAILED; the marker is always released.

use chrono::Utc;
use reach_core::config::DeliveryConfig;
use reach_core::store::{CampaignRepository, CommunicationLogRepository};
use reach_core::types::{
    Campaign, CampaignProgress, CampaignStatus, CommunicationLog, DeliveryOutcome, DeliveryRun,
    DeliveryStatus,
};
use reach_core::{ReachError, ReachResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::plan::DeliveryPlan;
use crate::registry::DeliveryRegistry;
use crate::stats::StatsAggregator;

const SIMULATED_VENDOR_RESPONSE: &str = "accepted";
const SIMULATED_FAILURE: &str = "Simulated delivery failure";

/// Result of asking for a delivery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_id: Uuid },
    /// Audience of zero: nothing was claimed or written.
    NothingToDeliver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Cancelled { after_step: u32 },
}

pub struct DeliveryOrchestrator {
    campaigns: Arc<dyn CampaignRepository>,
    logs: Arc<dyn CommunicationLogRepository>,
    aggregator: StatsAggregator,
    config: DeliveryConfig,
    registry: DeliveryRegistry,
}

impl DeliveryOrchestrator {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        logs: Arc<dyn CommunicationLogRepository>,
        config: DeliveryConfig,
    ) -> Self {
        let aggregator = StatsAggregator::new(campaigns.clone(), logs.clone());
        Self {
            campaigns,
            logs,
            aggregator,
            config,
            registry: DeliveryRegistry::new(),
        }
    }

    pub fn registry(&self) -> &DeliveryRegistry {
        &self.registry
    }

    pub fn aggregator(&self) -> &StatsAggregator {
        &self.aggregator
    }

    /// Claim the campaign and spawn its run. Returns once the run is
    /// scheduled; step failures are handled inside the run and never
    /// surface here.
    ///
    /// Errors: `NotFound` for an unknown campaign, `Conflict` when another
    /// run holds the campaign.
    pub async fn start(self: &Arc<Self>, campaign_id: Uuid) -> ReachResult<StartOutcome> {
        let campaign = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| ReachError::not_found("campaign", campaign_id))?;

        if campaign.audience_size == 0 {
            info!(campaign_id = %campaign_id, "Empty audience, no delivery run started");
            return Ok(StartOutcome::NothingToDeliver);
        }

        let run = DeliveryRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        if !self.campaigns.claim_run(campaign_id, run).await? {
            return Err(ReachError::Conflict(format!(
                "delivery already in progress for campaign {campaign_id}"
            )));
        }

        let audience = campaign.audience_size;
        let cancel = self.registry.register(campaign_id, run.run_id);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.execute(campaign, run.run_id, cancel).await;
        });
        self.registry.attach(campaign_id, run.run_id, handle);

        metrics::counter!("reach.delivery.runs_started").increment(1);
        info!(
            campaign_id = %campaign_id,
            run_id = %run.run_id,
            audience,
            steps = self.config.steps,
            "Delivery run started"
        );
        Ok(StartOutcome::Started { run_id: run.run_id })
    }

    /// Stop the campaign's run at its next step boundary. Counters keep
    /// whatever the last completed step wrote.
    pub fn cancel(&self, campaign_id: Uuid) -> bool {
        self.registry.cancel(campaign_id)
    }

    /// Cancel every in-flight run and wait for them to release their markers.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    async fn execute(self: Arc<Self>, campaign: Campaign, run_id: Uuid, cancel: CancellationToken) {
        let campaign_id = campaign.id;
        match self.step_through(&campaign, &cancel).await {
            Ok(RunOutcome::Completed) => {
                info!(campaign_id = %campaign_id, run_id = %run_id, "Delivery run completed");
            }
            Ok(RunOutcome::Cancelled { after_step }) => {
                warn!(campaign_id = %campaign_id, run_id = %run_id, after_step, "Delivery run cancelled");
            }
            Err(e) => {
                error!(campaign_id = %campaign_id, run_id = %run_id, error = %e, "Delivery run failed");
                metrics::counter!("reach.delivery.runs_failed").increment(1);
                if let Err(e) = self
                    .campaigns
                    .mark_failed(campaign_id, campaign.audience_size)
                    .await
                {
                    error!(campaign_id = %campaign_id, error = %e, "Failed to mark campaign as FAILED");
                }
            }
        }

        if let Err(e) = self.campaigns.release_run(campaign_id, run_id).await {
            error!(campaign_id = %campaign_id, run_id = %run_id, error = %e, "Failed to release delivery marker");
        }
        self.registry.finish(campaign_id, run_id);
    }

    async fn step_through(
        &self,
        campaign: &Campaign,
        cancel: &CancellationToken,
    ) -> ReachResult<RunOutcome> {
        let plan = DeliveryPlan::new(
            campaign.audience_size,
            self.config.success_rate,
            self.config.steps,
        );
        let mut ledger = self.load_ledger(campaign).await?;
        let interval = self.config.step_interval();

        for step in 1..=plan.steps {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled { after_step: step - 1 }),
                _ = tokio::time::sleep(interval) => {}
            }

            let target = plan.progress_at(step);
            let progress = match ledger.as_mut() {
                Some(ledger) => self.advance_ledger(campaign.id, ledger, target).await?,
                None => target,
            };
            self.campaigns.apply_progress(campaign.id, progress).await?;

            metrics::counter!("reach.delivery.steps").increment(1);
            debug!(
                campaign_id = %campaign.id,
                step,
                sent = progress.stats.sent,
                failed = progress.stats.failed,
                pending = progress.stats.pending,
                status = ?progress.status,
                "Delivery step applied"
            );
        }
        Ok(RunOutcome::Completed)
    }

    /// The campaign's log, when it holds exactly one record per recipient.
    async fn load_ledger(&self, campaign: &Campaign) -> ReachResult<Option<Ledger>> {
        let logs = self.logs.logs_for_campaign(campaign.id).await?;
        if logs.is_empty() {
            return Ok(None);
        }
        if logs.len() as u64 != campaign.audience_size {
            warn!(
                campaign_id = %campaign.id,
                records = logs.len(),
                audience = campaign.audience_size,
                "Communication log does not match audience, using planned counters"
            );
            return Ok(None);
        }
        Ok(Some(Ledger::new(logs)))
    }

    /// Resolve PENDING records up to the step's planned sent count (and fail
    /// the rest on the final step), then report the tallied counters.
    async fn advance_ledger(
        &self,
        campaign_id: Uuid,
        ledger: &mut Ledger,
        target: CampaignProgress,
    ) -> ReachResult<CampaignProgress> {
        let final_step = target.status == CampaignStatus::Completed;
        let mut to_send = target.stats.sent.saturating_sub(ledger.sent);
        let now = Utc::now();

        for entry in ledger.entries.iter_mut().filter(|e| e.pending) {
            let sending = to_send > 0;
            if !sending && !final_step {
                break;
            }
            let outcome = if sending {
                DeliveryOutcome::Sent {
                    delivery_id: format!("sim-{}", Uuid::new_v4()),
                    vendor_response: SIMULATED_VENDOR_RESPONSE.to_string(),
                }
            } else {
                DeliveryOutcome::Failed {
                    error_message: SIMULATED_FAILURE.to_string(),
                }
            };

            // `false` means the record was resolved elsewhere; the tally
            // below picks up whatever status it ended in.
            let resolved = self.logs.resolve_log(campaign_id, entry.id, outcome, now).await?;
            entry.pending = false;
            if resolved && sending {
                to_send -= 1;
                ledger.sent += 1;
            }
        }

        let stats = self.aggregator.tally(campaign_id).await?;
        Ok(CampaignProgress {
            stats,
            status: target.status,
        })
    }
}

struct LedgerEntry {
    id: Uuid,
    pending: bool,
}

/// Local view of the log so each step only touches records still PENDING.
struct Ledger {
    entries: Vec<LedgerEntry>,
    sent: u64,
}

impl Ledger {
    fn new(logs: Vec<CommunicationLog>) -> Self {
        let sent = logs
            .iter()
            .filter(|l| l.status == DeliveryStatus::Sent)
            .count() as u64;
        Self {
            entries: logs
                .into_iter()
                .map(|l| LedgerEntry {
                    id: l.id,
                    pending: l.status == DeliveryStatus::Pending,
                })
                .collect(),
            sent,
        }
    }
}
