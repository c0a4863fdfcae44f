//! Dashboard read models: headline totals, recent activity and daily trends.

use chrono::{Duration, NaiveDate, Utc};
use reach_core::store::{CampaignRepository, CustomerRepository, OrderRepository, Page};
use reach_core::types::{CampaignStatus, Customer};
use reach_core::ReachResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::*;

const RECENT_LIMIT: usize = 5;
const TOP_CUSTOMER_LIMIT: usize = 10;
const CAMPAIGN_PERFORMANCE_LIMIT: usize = 10;

pub struct DashboardService {
    customers: Arc<dyn CustomerRepository>,
    orders: Arc<dyn OrderRepository>,
    campaigns: Arc<dyn CampaignRepository>,
}

impl DashboardService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        orders: Arc<dyn OrderRepository>,
        campaigns: Arc<dyn CampaignRepository>,
    ) -> Self {
        Self {
            customers,
            orders,
            campaigns,
        }
    }

    /// Store-wide customer and order counts, the owner's campaign totals and
    /// the five newest customers and orders.
    ///
    /// `campaignStats.pending` only counts the audience of campaigns still in
    /// PENDING status.
    pub async fn stats(&self, owner: &str) -> ReachResult<DashboardStats> {
        let total_customers = self.customers.count_customers(&|_| true).await?;
        let orders = self.orders.list_orders(None, Page::all()).await?;
        let campaigns = self.campaigns.list_campaigns(owner, Page::all()).await?;

        let campaign_stats = campaigns.iter().fold(CampaignTotals::default(), |mut t, c| {
            t.sent += c.sent_count;
            t.failed += c.failed_count;
            if c.status == CampaignStatus::Pending {
                t.pending += c.audience_size;
            }
            t
        });

        let recent_customers = self
            .customers
            .find_customers(
                &|_| true,
                Page {
                    newest_first: true,
                    ..Page::first(RECENT_LIMIT)
                },
            )
            .await?;

        debug!(owner, campaigns = campaigns.len(), "Dashboard stats computed");
        Ok(DashboardStats {
            total_customers,
            total_orders: orders.len() as u64,
            total_campaigns: campaigns.len() as u64,
            campaign_stats,
            recent_activity: RecentActivity {
                customers: recent_customers.into_iter().map(RecentCustomer::from).collect(),
                // list_orders is newest order date first
                orders: orders
                    .into_iter()
                    .take(RECENT_LIMIT)
                    .map(RecentOrder::from)
                    .collect(),
            },
        })
    }

    /// Daily customer sign-ups and revenue over the last `period` days, the
    /// ten biggest spenders and the owner's ten newest campaigns.
    pub async fn analytics(&self, owner: &str, period: u32) -> ReachResult<DashboardAnalytics> {
        let since = Utc::now() - Duration::days(i64::from(period));

        let customers = self.customers.find_customers(&|_| true, Page::all()).await?;
        let mut growth: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for c in customers.iter().filter(|c| c.created_at >= since) {
            *growth.entry(c.created_at.date_naive()).or_default() += 1;
        }

        let orders = self.orders.list_orders(None, Page::all()).await?;
        let mut revenue: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
        for o in orders.iter().filter(|o| o.order_date >= since) {
            let day = revenue.entry(o.order_date.date_naive()).or_default();
            day.0 += o.order_amount;
            day.1 += 1;
        }

        let campaigns = self
            .campaigns
            .list_campaigns(
                owner,
                Page {
                    newest_first: true,
                    ..Page::first(CAMPAIGN_PERFORMANCE_LIMIT)
                },
            )
            .await?;

        Ok(DashboardAnalytics {
            customer_growth: growth
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            revenue_trends: revenue
                .into_iter()
                .map(|(date, (revenue, orders))| DailyRevenue {
                    date,
                    revenue,
                    orders,
                })
                .collect(),
            top_customers: top_spenders(customers, TOP_CUSTOMER_LIMIT),
            campaign_performance: campaigns.into_iter().map(CampaignPerformance::from).collect(),
            period,
        })
    }
}

fn top_spenders(mut customers: Vec<Customer>, limit: usize) -> Vec<TopCustomer> {
    customers.sort_by(|a, b| b.total_spends.total_cmp(&a.total_spends));
    customers.into_iter().take(limit).map(TopCustomer::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach_core::types::{Campaign, Order, OrderStatus};
    use reach_core::InMemoryStore;
    use uuid::Uuid;

    fn service(store: &Arc<InMemoryStore>) -> DashboardService {
        DashboardService::new(store.clone(), store.clone(), store.clone())
    }

    async fn seed(store: &InMemoryStore) {
        let now = Utc::now();
        for (i, spend) in [300.0, 9000.0, 1500.0, 42.0, 7000.0, 100.0].iter().enumerate() {
            let mut c = Customer::new(
                format!("C{i}"),
                format!("c{i}@x.io"),
                now - Duration::days(i as i64 * 10),
            );
            c.total_spends = *spend;
            store.insert_customer(c.clone()).await.unwrap();
            store
                .insert_order(Order {
                    id: Uuid::new_v4(),
                    customer_id: c.id,
                    customer_email: c.email.clone(),
                    order_amount: 100.0,
                    order_date: now - Duration::days(i as i64 * 10),
                    status: OrderStatus::Completed,
                    products: Vec::new(),
                    created_at: now,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn stats_sum_owner_campaigns_and_list_recent_activity() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;

        let mut done = Campaign::new("user-1", "Done", Vec::new(), "Hi", 10);
        done.status = CampaignStatus::Completed;
        done.sent_count = 9;
        done.failed_count = 1;
        let mut waiting = Campaign::new("user-1", "Waiting", Vec::new(), "Hi", 4);
        waiting.status = CampaignStatus::Pending;
        let active = Campaign::new("user-1", "Running", Vec::new(), "Hi", 7);
        let foreign = Campaign::new("user-2", "Other", Vec::new(), "Hi", 100);
        for c in [done, waiting, active, foreign] {
            store.insert_campaign(c).await.unwrap();
        }

        let stats = service(&store).stats("user-1").await.unwrap();
        assert_eq!(stats.total_customers, 6);
        assert_eq!(stats.total_orders, 6);
        assert_eq!(stats.total_campaigns, 3);
        assert_eq!(
            stats.campaign_stats,
            CampaignTotals {
                sent: 9,
                failed: 1,
                pending: 4
            }
        );
        assert_eq!(stats.recent_activity.customers.len(), RECENT_LIMIT);
        assert_eq!(stats.recent_activity.customers[0].email, "c0@x.io");
        assert_eq!(stats.recent_activity.orders.len(), RECENT_LIMIT);
        assert_eq!(stats.recent_activity.orders[0].customer_email, "c0@x.io");
    }

    #[tokio::test]
    async fn analytics_groups_by_day_within_period() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        store
            .insert_campaign(Campaign::new("user-1", "Only", Vec::new(), "Hi", 3))
            .await
            .unwrap();

        let analytics = service(&store).analytics("user-1", 25).await.unwrap();
        assert_eq!(analytics.period, 25);
        // Customers created 0, 10 and 20 days ago fall inside 25 days.
        assert_eq!(analytics.customer_growth.len(), 3);
        assert!(analytics.customer_growth.iter().all(|d| d.count == 1));
        assert!(analytics
            .customer_growth
            .windows(2)
            .all(|w| w[0].date < w[1].date));
        assert_eq!(analytics.revenue_trends.len(), 3);
        assert_eq!(analytics.revenue_trends[0].revenue, 100.0);
        assert_eq!(analytics.revenue_trends[0].orders, 1);

        let spends: Vec<f64> = analytics.top_customers.iter().map(|c| c.total_spends).collect();
        assert_eq!(spends, vec![9000.0, 7000.0, 1500.0, 300.0, 100.0, 42.0]);
        assert_eq!(analytics.campaign_performance.len(), 1);
        assert_eq!(analytics.campaign_performance[0].name, "Only");
    }

    #[tokio::test]
    async fn empty_store_yields_zeroes() {
        let store = Arc::new(InMemoryStore::new());
        let stats = service(&store).stats("nobody").await.unwrap();
        assert_eq!(stats.total_customers, 0);
        assert_eq!(stats.campaign_stats, CampaignTotals::default());
        assert!(stats.recent_activity.orders.is_empty());

        let analytics = service(&store).analytics("nobody", 30).await.unwrap();
        assert!(analytics.customer_growth.is_empty());
        assert!(analytics.top_customers.is_empty());
    }
}
