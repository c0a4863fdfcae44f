//! Per-recipient dispatch: personalize the template and queue PENDING records.

use reach_core::store::CommunicationLogRepository;
use reach_core::types::{Campaign, CommunicationLog, Customer};
use reach_core::ReachResult;
use tracing::debug;

const NAME_PLACEHOLDER: &str = "{name}";

/// Substitute every `{name}` in the template with the recipient's name.
pub fn personalize(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

/// Write one PENDING communication log per recipient, in recipient order.
pub async fn dispatch(
    logs: &dyn CommunicationLogRepository,
    campaign: &Campaign,
    recipients: &[Customer],
) -> ReachResult<usize> {
    let records: Vec<CommunicationLog> = recipients
        .iter()
        .map(|c| CommunicationLog::pending(campaign, c, personalize(&campaign.message, &c.name)))
        .collect();
    let written = logs.insert_logs(records).await?;
    debug!(campaign_id = %campaign.id, records = written, "Dispatched communication log");
    Ok(written)
}
