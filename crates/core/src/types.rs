use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ─── Customer ──────────────────────────────────────────────────────────────

/// A customer record, mutated by ingestion and read by segmentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    /// Unique key; always stored trimmed and lowercased.
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub total_spends: f64,
    pub visits: u64,
    pub last_visit: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl AsRef<str>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: normalize_email(email.as_ref()),
            phone: None,
            total_spends: 0.0,
            visits: 0,
            last_visit: now,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ─── Order ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub order_amount: f64,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(default)]
    pub products: Vec<OrderProduct>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProduct {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
}

// ─── Audience rules (wire format) ──────────────────────────────────────────

/// One audience rule exactly as clients send it.
///
/// `field` and `operator` stay free-form strings here; the segmentation
/// crate lowers them into typed criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: i64,
    pub field: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default)]
    pub logical_operator: Option<LogicalOperator>,
}

impl Rule {
    pub fn new(
        id: i64,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
        logical_operator: Option<LogicalOperator>,
    ) -> Self {
        Self {
            id,
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            logical_operator,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum LogicalOperator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Only `OR` (any case) opens a new group. Every other connector, including
/// an empty string or a non-string value, reads as `AND`.
impl<'de> Deserialize<'de> for LogicalOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            Some(s) if s.trim().eq_ignore_ascii_case("or") => LogicalOperator::Or,
            _ => LogicalOperator::And,
        })
    }
}

/// Rule values arrive as strings from the builder UI and as numbers from
/// older clients; both are kept in their textual form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub rules: Vec<Rule>,
    /// Template; `{name}` is replaced per recipient.
    pub message: String,
    pub audience_size: u64,
    pub status: CampaignStatus,
    pub sent_count: u64,
    pub failed_count: u64,
    pub delivery_stats: DeliveryStats,
    /// Set while a delivery run owns this campaign.
    #[serde(default)]
    pub delivery_run: Option<DeliveryRun>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryStats {
    pub sent: u64,
    pub failed: u64,
    pub pending: u64,
}

impl DeliveryStats {
    pub fn total(&self) -> u64 {
        self.sent + self.failed + self.pending
    }
}

/// Persisted in-flight marker of a delivery run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl Campaign {
    /// A freshly created campaign: ACTIVE, nothing sent, whole audience pending.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        rules: Vec<Rule>,
        message: impl Into<String>,
        audience_size: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into().trim().to_string(),
            rules,
            message: message.into(),
            audience_size,
            status: CampaignStatus::Active,
            sent_count: 0,
            failed_count: 0,
            delivery_stats: DeliveryStats {
                sent: 0,
                failed: 0,
                pending: audience_size,
            },
            delivery_run: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `sent + failed + pending == audience` using the top-level counters.
    pub fn counters_balanced(&self) -> bool {
        self.sent_count + self.failed_count + self.delivery_stats.pending == self.audience_size
    }
}

/// Counter and status write produced by one delivery step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignProgress {
    pub stats: DeliveryStats,
    pub status: CampaignStatus,
}

// ─── Communication log ─────────────────────────────────────────────────────

/// Per-recipient delivery record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationLog {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub message: String,
    pub personalized_message: String,
    pub status: DeliveryStatus,
    pub delivery_attempts: u32,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vendor_response: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub delivery_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl CommunicationLog {
    pub fn pending(
        campaign: &Campaign,
        customer: &Customer,
        personalized_message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            customer_id: customer.id,
            customer_email: customer.email.clone(),
            customer_name: customer.name.clone(),
            message: campaign.message.clone(),
            personalized_message: personalized_message.into(),
            status: DeliveryStatus::Pending,
            delivery_attempts: 0,
            sent_at: None,
            failed_at: None,
            vendor_response: None,
            error_message: None,
            delivery_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Terminal outcome applied to a PENDING log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent {
        delivery_id: String,
        vendor_response: String,
    },
    Failed {
        error_message: String,
    },
}
