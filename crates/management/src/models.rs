//! Request and response bodies for the management API.

use chrono::{DateTime, NaiveDate, Utc};
use reach_core::types::{
    Campaign, CampaignStatus, Customer, DeliveryStats, Order, OrderProduct, OrderStatus, Rule,
};
use reach_segmentation::MessageSuggestion;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// ─── Segments ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub count: u64,
    pub preview: Vec<Customer>,
}

// ─── Rule and message assist ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConvertRulesRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRulesResponse {
    pub success: bool,
    pub rules: Vec<Rule>,
    pub original_prompt: String,
    pub confidence: f64,
    pub source: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessagesRequest {
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub campaign_objective: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMessagesResponse {
    pub success: bool,
    pub messages: Vec<MessageSuggestion>,
    pub objective: String,
    pub rules_analyzed: usize,
    pub source: &'static str,
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

/// Every field is optional on the wire so missing ones surface as a 400
/// with a message instead of a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub message: Option<String>,
    /// Client-side estimate; the server recomputes the audience.
    #[serde(default)]
    pub audience_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCreated {
    pub id: Uuid,
    pub name: String,
    pub audience_size: u64,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateCampaignResponse {
    pub success: bool,
    pub campaign: CampaignCreated,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub id: Uuid,
    pub name: String,
    pub audience_size: u64,
    pub sent_count: u64,
    pub failed_count: u64,
    pub status: CampaignStatus,
    pub message: String,
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignSummary {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            audience_size: c.audience_size,
            sent_count: c.sent_count,
            failed_count: c.failed_count,
            status: c.status,
            message: c.message,
            rules: c.rules,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_campaign_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTriggered {
    pub message: String,
    pub campaign_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCancelled {
    pub campaign_id: Uuid,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub campaign_id: Uuid,
    pub delivery_stats: DeliveryStats,
}

// ─── Ingestion ─────────────────────────────────────────────────────────────

/// A single object or an array of them.
#[derive(Debug)]
pub struct Batch<T>(pub Vec<T>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Batch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            Many(Vec<T>),
            One(T),
        }
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::Many(items) => Batch(items),
            OneOrMany::One(item) => Batch(vec![item]),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub total_spends: Option<f64>,
    #[serde(default)]
    pub visits: Option<u64>,
    #[serde(default)]
    pub last_visit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub products: Vec<OrderProduct>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CustomerResult {
    Created { customer: Customer },
    Updated { customer: Customer },
    Error { email: Option<String>, error: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderResult {
    Created { order: Order },
    #[serde(rename_all = "camelCase")]
    Error {
        customer_email: Option<String>,
        error: String,
    },
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub total: usize,
    pub created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse<R> {
    pub success: bool,
    pub message: String,
    pub results: Vec<R>,
    pub summary: IngestSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_data_limit")]
    pub limit: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub min_spend: Option<f64>,
    #[serde(default)]
    pub max_spend: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_data_limit")]
    pub limit: usize,
    #[serde(default)]
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current: usize,
    pub pages: usize,
    pub total: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(current: usize, total: usize, limit: usize) -> Self {
        Self {
            current,
            pages: total.div_ceil(limit.max(1)),
            total,
            limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total: u64,
    pub total_spends: f64,
    pub average_spends: f64,
    pub total_visits: u64,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: u64,
    pub total_revenue: f64,
    pub average_order_value: f64,
}

#[derive(Debug, Serialize)]
pub struct DataStats {
    pub customers: CustomerStats,
    pub orders: OrderStats,
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct CampaignTotals {
    pub sent: u64,
    pub failed: u64,
    pub pending: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub total_spends: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for RecentCustomer {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            total_spends: c.total_spends,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: Uuid,
    pub customer_email: String,
    pub order_amount: f64,
    pub order_date: DateTime<Utc>,
}

impl From<Order> for RecentOrder {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            customer_email: o.customer_email,
            order_amount: o.order_amount,
            order_date: o.order_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecentActivity {
    pub customers: Vec<RecentCustomer>,
    pub orders: Vec<RecentOrder>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_orders: u64,
    pub total_campaigns: u64,
    pub campaign_stats: CampaignTotals,
    pub recent_activity: RecentActivity,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Look-back window in days.
    #[serde(default = "default_period")]
    pub period: u32,
}

#[derive(Debug, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub total_spends: f64,
    pub visits: u64,
}

impl From<Customer> for TopCustomer {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            total_spends: c.total_spends,
            visits: c.visits,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPerformance {
    pub id: Uuid,
    pub name: String,
    pub audience_size: u64,
    pub sent_count: u64,
    pub failed_count: u64,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignPerformance {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            audience_size: c.audience_size,
            sent_count: c.sent_count,
            failed_count: c.failed_count,
            status: c.status,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub customer_growth: Vec<DailyCount>,
    pub revenue_trends: Vec<DailyRevenue>,
    pub top_customers: Vec<TopCustomer>,
    pub campaign_performance: Vec<CampaignPerformance>,
    pub period: u32,
}

// ─── Health ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub active_runs: usize,
}

fn default_page() -> usize {
    1
}
fn default_campaign_limit() -> usize {
    10
}
fn default_data_limit() -> usize {
    50
}
fn default_period() -> u32 {
    30
}
