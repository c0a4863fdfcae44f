//! Repository traits and the in-memory store backed by DashMap.
//!
//! The traits describe the document-store surface the rest of the workspace
//! needs (CRUD plus a couple of aggregations). `InMemoryStore` implements all
//! of them for development and tests; a database-backed store only has to
//! provide the same four traits.

use crate::error::{ReachError, ReachResult};
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Predicate over a customer, evaluated by the store while scanning.
pub type CustomerFilter<'a> = dyn Fn(&Customer) -> bool + Send + Sync + 'a;

/// Window over an ordered result set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub skip: usize,
    pub limit: Option<usize>,
    /// Newest `created_at` first instead of oldest first.
    pub newest_first: bool,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self {
            skip: 0,
            limit: Some(limit),
            newest_first: false,
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> ReachResult<Option<Customer>>;

    /// Insert a new customer; fails with `Conflict` when the email is taken.
    async fn insert_customer(&self, customer: Customer) -> ReachResult<Customer>;

    /// Replace an existing customer (matched by id).
    async fn save_customer(&self, customer: Customer) -> ReachResult<Customer>;

    /// Customers matching `filter`, ordered by `created_at` then email.
    async fn find_customers(
        &self,
        filter: &CustomerFilter<'_>,
        page: Page,
    ) -> ReachResult<Vec<Customer>>;

    async fn count_customers(&self, filter: &CustomerFilter<'_>) -> ReachResult<u64>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: Order) -> ReachResult<Order>;

    async fn list_orders(&self, customer_email: Option<&str>, page: Page)
        -> ReachResult<Vec<Order>>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert_campaign(&self, campaign: Campaign) -> ReachResult<Campaign>;

    async fn get_campaign(&self, id: Uuid) -> ReachResult<Option<Campaign>>;

    async fn list_campaigns(&self, user_id: &str, page: Page) -> ReachResult<Vec<Campaign>>;

    /// Write one delivery step: counters, stats and status together.
    async fn apply_progress(&self, id: Uuid, progress: CampaignProgress) -> ReachResult<()>;

    /// Overwrite counters from log-derived stats, leaving status untouched.
    async fn write_stats(&self, id: Uuid, stats: DeliveryStats) -> ReachResult<()>;

    /// Terminal failure write: `status = FAILED`, `failedCount = failed_count`.
    async fn mark_failed(&self, id: Uuid, failed_count: u64) -> ReachResult<()>;

    /// Set the in-flight marker if no run holds it. Returns `false` when
    /// another run already owns the campaign.
    async fn claim_run(&self, id: Uuid, run: DeliveryRun) -> ReachResult<bool>;

    /// Clear the in-flight marker if it still belongs to `run_id`.
    async fn release_run(&self, id: Uuid, run_id: Uuid) -> ReachResult<()>;
}

#[async_trait]
pub trait CommunicationLogRepository: Send + Sync {
    async fn insert_logs(&self, logs: Vec<CommunicationLog>) -> ReachResult<usize>;

    /// Records of one campaign in dispatch order.
    async fn logs_for_campaign(&self, campaign_id: Uuid) -> ReachResult<Vec<CommunicationLog>>;

    /// Group the campaign's records by status and count them.
    async fn count_by_status(&self, campaign_id: Uuid)
        -> ReachResult<HashMap<DeliveryStatus, u64>>;

    /// Move a PENDING record to its terminal status. Returns `false` if the
    /// record was already terminal; records are never reopened.
    async fn resolve_log(
        &self,
        campaign_id: Uuid,
        log_id: Uuid,
        outcome: DeliveryOutcome,
        at: DateTime<Utc>,
    ) -> ReachResult<bool>;
}

/// Thread-safe in-memory store for customers, orders, campaigns and logs.
pub struct InMemoryStore {
    customers: DashMap<Uuid, Customer>,
    email_index: DashMap<String, Uuid>,
    orders: DashMap<Uuid, Order>,
    campaigns: DashMap<Uuid, Campaign>,
    /// campaign_id -> records in dispatch order
    logs: DashMap<Uuid, Vec<CommunicationLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("In-memory store initialized (development mode)");
        Self {
            customers: DashMap::new(),
            email_index: DashMap::new(),
            orders: DashMap::new(),
            campaigns: DashMap::new(),
            logs: DashMap::new(),
        }
    }

    fn update_campaign<F>(&self, id: Uuid, f: F) -> ReachResult<()>
    where
        F: FnOnce(&mut Campaign),
    {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| ReachError::not_found("campaign", id))?;
        let campaign = entry.value_mut();
        f(campaign);
        campaign.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Customers ─────────────────────────────────────────────────────────────

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_customer_by_email(&self, email: &str) -> ReachResult<Option<Customer>> {
        let email = normalize_email(email);
        Ok(self
            .email_index
            .get(&email)
            .and_then(|id| self.customers.get(id.value()).map(|c| c.value().clone())))
    }

    async fn insert_customer(&self, mut customer: Customer) -> ReachResult<Customer> {
        customer.email = normalize_email(&customer.email);
        match self.email_index.entry(customer.email.clone()) {
            Entry::Occupied(_) => Err(ReachError::Conflict(format!(
                "customer with email {} already exists",
                customer.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(customer.id);
                self.customers.insert(customer.id, customer.clone());
                debug!(customer_id = %customer.id, "Customer inserted");
                Ok(customer)
            }
        }
    }

    async fn save_customer(&self, customer: Customer) -> ReachResult<Customer> {
        let mut entry = self
            .customers
            .get_mut(&customer.id)
            .ok_or_else(|| ReachError::not_found("customer", customer.id))?;
        *entry.value_mut() = customer.clone();
        Ok(customer)
    }

    async fn find_customers(
        &self,
        filter: &CustomerFilter<'_>,
        page: Page,
    ) -> ReachResult<Vec<Customer>> {
        let mut matched: Vec<Customer> = self
            .customers
            .iter()
            .filter(|r| filter(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.email.cmp(&b.email))
        });
        if page.newest_first {
            matched.reverse();
        }
        Ok(page.apply(matched))
    }

    async fn count_customers(&self, filter: &CustomerFilter<'_>) -> ReachResult<u64> {
        Ok(self.customers.iter().filter(|r| filter(r.value())).count() as u64)
    }
}

// ─── Orders ────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: Order) -> ReachResult<Order> {
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_orders(
        &self,
        customer_email: Option<&str>,
        page: Page,
    ) -> ReachResult<Vec<Order>> {
        let email = customer_email.map(normalize_email);
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|r| email.as_deref().map_or(true, |e| r.value().customer_email == e))
            .map(|r| r.value().clone())
            .collect();
        // Most recent order first.
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(page.apply(orders))
    }
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

#[async_trait]
impl CampaignRepository for InMemoryStore {
    async fn insert_campaign(&self, campaign: Campaign) -> ReachResult<Campaign> {
        self.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign(&self, id: Uuid) -> ReachResult<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|r| r.value().clone()))
    }

    async fn list_campaigns(&self, user_id: &str, page: Page) -> ReachResult<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if page.newest_first {
            campaigns.reverse();
        }
        Ok(page.apply(campaigns))
    }

    async fn apply_progress(&self, id: Uuid, progress: CampaignProgress) -> ReachResult<()> {
        self.update_campaign(id, |c| {
            c.sent_count = progress.stats.sent;
            c.failed_count = progress.stats.failed;
            c.delivery_stats = progress.stats;
            c.status = progress.status;
        })
    }

    async fn write_stats(&self, id: Uuid, stats: DeliveryStats) -> ReachResult<()> {
        self.update_campaign(id, |c| {
            c.sent_count = stats.sent;
            c.failed_count = stats.failed;
            c.delivery_stats = stats;
        })
    }

    async fn mark_failed(&self, id: Uuid, failed_count: u64) -> ReachResult<()> {
        self.update_campaign(id, |c| {
            c.status = CampaignStatus::Failed;
            c.failed_count = failed_count;
        })
    }

    async fn claim_run(&self, id: Uuid, run: DeliveryRun) -> ReachResult<bool> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| ReachError::not_found("campaign", id))?;
        let campaign = entry.value_mut();
        if campaign.delivery_run.is_some() {
            return Ok(false);
        }
        campaign.delivery_run = Some(run);
        campaign.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_run(&self, id: Uuid, run_id: Uuid) -> ReachResult<()> {
        self.update_campaign(id, |c| {
            if c.delivery_run.map(|r| r.run_id) == Some(run_id) {
                c.delivery_run = None;
            }
        })
    }
}

// ─── Communication log ─────────────────────────────────────────────────────

#[async_trait]
impl CommunicationLogRepository for InMemoryStore {
    async fn insert_logs(&self, logs: Vec<CommunicationLog>) -> ReachResult<usize> {
        let count = logs.len();
        for log in logs {
            self.logs.entry(log.campaign_id).or_default().push(log);
        }
        Ok(count)
    }

    async fn logs_for_campaign(&self, campaign_id: Uuid) -> ReachResult<Vec<CommunicationLog>> {
        Ok(self
            .logs
            .get(&campaign_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn count_by_status(
        &self,
        campaign_id: Uuid,
    ) -> ReachResult<HashMap<DeliveryStatus, u64>> {
        let mut counts = HashMap::new();
        if let Some(logs) = self.logs.get(&campaign_id) {
            for log in logs.value() {
                *counts.entry(log.status).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn resolve_log(
        &self,
        campaign_id: Uuid,
        log_id: Uuid,
        outcome: DeliveryOutcome,
        at: DateTime<Utc>,
    ) -> ReachResult<bool> {
        let mut entry = self
            .logs
            .get_mut(&campaign_id)
            .ok_or_else(|| ReachError::not_found("communication log", campaign_id))?;
        let log = entry
            .value_mut()
            .iter_mut()
            .find(|l| l.id == log_id)
            .ok_or_else(|| ReachError::not_found("communication log", log_id))?;

        if log.status != DeliveryStatus::Pending {
            return Ok(false);
        }
        log.delivery_attempts += 1;
        match outcome {
            DeliveryOutcome::Sent {
                delivery_id,
                vendor_response,
            } => {
                log.status = DeliveryStatus::Sent;
                log.sent_at = Some(at);
                log.delivery_id = Some(delivery_id);
                log.vendor_response = Some(vendor_response);
            }
            DeliveryOutcome::Failed { error_message } => {
                log.status = DeliveryStatus::Failed;
                log.failed_at = Some(at);
                log.error_message = Some(error_message);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: &str, email: &str) -> Customer {
        Customer::new(name, email, Utc::now())
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_insensitive() {
        let store = InMemoryStore::new();
        store.insert_customer(customer("A", "a@x.io")).await.unwrap();
        let err = store.insert_customer(customer("B", "A@X.io")).await.unwrap_err();
        assert!(matches!(err, ReachError::Conflict(_)));

        let found = store.find_customer_by_email(" A@x.IO ").await.unwrap();
        assert_eq!(found.map(|c| c.name), Some("A".to_string()));
    }

    #[tokio::test]
    async fn claim_run_is_exclusive_until_released() {
        let store = InMemoryStore::new();
        let campaign = store
            .insert_campaign(Campaign::new("u", "c", Vec::new(), "m", 10))
            .await
            .unwrap();
        let first = DeliveryRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        let second = DeliveryRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };

        assert!(store.claim_run(campaign.id, first).await.unwrap());
        assert!(!store.claim_run(campaign.id, second).await.unwrap());

        // A stale release from another run leaves the marker alone.
        store.release_run(campaign.id, second.run_id).await.unwrap();
        assert!(!store.claim_run(campaign.id, second).await.unwrap());

        store.release_run(campaign.id, first.run_id).await.unwrap();
        assert!(store.claim_run(campaign.id, second).await.unwrap());
    }

    #[tokio::test]
    async fn log_records_resolve_at_most_once() {
        let store = InMemoryStore::new();
        let campaign = Campaign::new("u", "c", Vec::new(), "Hi {name}", 1);
        let c = customer("Ravi", "ravi@x.io");
        let log = CommunicationLog::pending(&campaign, &c, "Hi Ravi");
        let log_id = log.id;
        store.insert_logs(vec![log]).await.unwrap();

        let sent = DeliveryOutcome::Sent {
            delivery_id: "d-1".into(),
            vendor_response: "accepted".into(),
        };
        assert!(store
            .resolve_log(campaign.id, log_id, sent, Utc::now())
            .await
            .unwrap());
        let failed = DeliveryOutcome::Failed {
            error_message: "late".into(),
        };
        assert!(!store
            .resolve_log(campaign.id, log_id, failed, Utc::now())
            .await
            .unwrap());

        let logs = store.logs_for_campaign(campaign.id).await.unwrap();
        assert_eq!(logs[0].status, DeliveryStatus::Sent);
        assert_eq!(logs[0].delivery_attempts, 1);
        assert!(logs[0].failed_at.is_none());
    }

    #[tokio::test]
    async fn find_customers_orders_and_pages() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for (i, email) in ["c@x.io", "a@x.io", "b@x.io"].iter().enumerate() {
            let created = base + chrono::Duration::seconds(i as i64);
            store
                .insert_customer(Customer::new("n", email, created))
                .await
                .unwrap();
        }
        let all = store.find_customers(&|_| true, Page::all()).await.unwrap();
        let emails: Vec<_> = all.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["c@x.io", "a@x.io", "b@x.io"]);

        let newest = store
            .find_customers(
                &|_| true,
                Page {
                    skip: 1,
                    limit: Some(1),
                    newest_first: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(newest[0].email, "a@x.io");
    }
}
