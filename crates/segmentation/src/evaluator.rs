//! Segment evaluator — runs a compiled predicate against the customer store.

use reach_core::store::{CustomerRepository, Page};
use reach_core::types::Customer;
use reach_core::ReachResult;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::predicates::Predicate;

/// Upper bound on the preview sample, whatever the configured limit.
pub const MAX_PREVIEW: usize = 5;

/// Audience size plus a bounded, stably ordered sample.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPreview {
    pub count: u64,
    pub sample: Vec<Customer>,
}

pub struct SegmentEvaluator {
    customers: Arc<dyn CustomerRepository>,
    preview_limit: usize,
}

impl SegmentEvaluator {
    pub fn new(customers: Arc<dyn CustomerRepository>, preview_limit: usize) -> Self {
        Self {
            customers,
            preview_limit: preview_limit.min(MAX_PREVIEW),
        }
    }

    /// Count the segment and take the first `preview_limit` members by
    /// creation time. Read-only.
    pub async fn evaluate(&self, predicate: &Predicate) -> ReachResult<SegmentPreview> {
        let filter = |c: &Customer| predicate.matches(c);
        let count = self.customers.count_customers(&filter).await?;
        let sample = self
            .customers
            .find_customers(&filter, Page::first(self.preview_limit))
            .await?;
        debug!(
            count,
            sample = sample.len(),
            conditions = predicate.condition_count(),
            "Segment evaluated"
        );
        Ok(SegmentPreview { count, sample })
    }

    /// Every member of the segment, in the same order as the preview sample.
    pub async fn recipients(&self, predicate: &Predicate) -> ReachResult<Vec<Customer>> {
        let filter = |c: &Customer| predicate.matches(c);
        self.customers.find_customers(&filter, Page::all()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use chrono::{Duration, Utc};
    use reach_core::types::Rule;
    use reach_core::InMemoryStore;

    async fn seeded_store(n: usize) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let base = Utc::now() - Duration::days(100);
        for i in 0..n {
            let mut c = Customer::new(
                format!("Customer {i}"),
                format!("c{i:02}@example.com"),
                base + Duration::minutes(i as i64),
            );
            c.total_spends = (i as f64) * 1000.0;
            store.insert_customer(c).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn counts_and_caps_sample_at_limit() {
        let store = seeded_store(12).await;
        let evaluator = SegmentEvaluator::new(store, 5);
        let predicate = compile(&[Rule::new(1, "totalSpends", ">=", "3000", None)]);

        let preview = evaluator.evaluate(&predicate).await.unwrap();
        assert_eq!(preview.count, 9);
        assert_eq!(preview.sample.len(), 5);
        assert_eq!(preview.sample[0].email, "c03@example.com");
    }

    #[tokio::test]
    async fn oversized_limit_is_clamped() {
        let store = seeded_store(12).await;
        let evaluator = SegmentEvaluator::new(store, 50);
        let preview = evaluator.evaluate(&compile(&[])).await.unwrap();
        assert_eq!(preview.count, 12);
        assert_eq!(preview.sample.len(), MAX_PREVIEW);
    }

    #[tokio::test]
    async fn sample_is_stable_across_calls() {
        let store = seeded_store(8).await;
        let evaluator = SegmentEvaluator::new(store, 5);
        let predicate = compile(&[]);
        let a = evaluator.evaluate(&predicate).await.unwrap();
        let b = evaluator.evaluate(&predicate).await.unwrap();
        let emails = |p: &SegmentPreview| p.sample.iter().map(|c| c.email.clone()).collect::<Vec<_>>();
        assert_eq!(emails(&a), emails(&b));
        assert_eq!(a.count, 8);
    }

    #[tokio::test]
    async fn recipients_returns_whole_segment() {
        let store = seeded_store(7).await;
        let evaluator = SegmentEvaluator::new(store, 5);
        let predicate = compile(&[Rule::new(1, "email", "startsWith", "C0", None)]);
        let all = evaluator.recipients(&predicate).await.unwrap();
        assert_eq!(all.len(), 7);
    }
}
