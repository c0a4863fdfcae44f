//! Staged delivery plan: the counters every step of a run has to reach.

use reach_core::types::{CampaignProgress, CampaignStatus, DeliveryStats};

/// Target counters for a run, fixed up front from the audience size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPlan {
    pub audience_size: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub steps: u32,
    sent_per_step: u64,
}

impl DeliveryPlan {
    pub fn new(audience_size: u64, success_rate: f64, steps: u32) -> Self {
        let steps = steps.max(1);
        let rate = success_rate.clamp(0.0, 1.0);
        let total_sent = ((audience_size as f64 * rate).floor() as u64).min(audience_size);
        Self {
            audience_size,
            total_sent,
            total_failed: audience_size - total_sent,
            steps,
            sent_per_step: total_sent.div_ceil(u64::from(steps)),
        }
    }

    /// Counters and status after `step` (1-based). Failures only land on
    /// the final step.
    pub fn progress_at(&self, step: u32) -> CampaignProgress {
        let step = step.clamp(1, self.steps);
        let is_final = step == self.steps;
        let sent = self
            .total_sent
            .min(u64::from(step).saturating_mul(self.sent_per_step));
        let failed = if is_final { self.total_failed } else { 0 };
        CampaignProgress {
            stats: DeliveryStats {
                sent,
                failed,
                pending: self.audience_size - sent - failed,
            },
            status: if is_final {
                CampaignStatus::Completed
            } else {
                CampaignStatus::Active
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CampaignProgress> + '_ {
        (1..=self.steps).map(move |s| self.progress_at(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_recipients_end_at_ninety_ten() {
        let plan = DeliveryPlan::new(100, 0.9, 8);
        assert_eq!(plan.total_sent, 90);
        assert_eq!(plan.total_failed, 10);

        let last = plan.progress_at(8);
        assert_eq!(
            last.stats,
            DeliveryStats {
                sent: 90,
                failed: 10,
                pending: 0
            }
        );
        assert_eq!(last.status, CampaignStatus::Completed);

        // ceil(90 / 8) = 12 per step
        let first = plan.progress_at(1);
        assert_eq!(first.stats.sent, 12);
        assert_eq!(first.stats.pending, 88);
        assert_eq!(first.status, CampaignStatus::Active);
    }

    #[test]
    fn every_step_balances_and_never_goes_backwards() {
        for audience in [1u64, 2, 7, 8, 9, 10, 33, 100, 1001, 12_345] {
            let plan = DeliveryPlan::new(audience, 0.9, 8);
            let mut prev = DeliveryStats::default();
            for progress in plan.iter() {
                let s = progress.stats;
                assert_eq!(s.total(), audience, "audience {audience}");
                assert!(s.sent >= prev.sent && s.failed >= prev.failed);
                prev = s;
            }
            assert_eq!(prev.pending, 0);
        }
    }

    #[test]
    fn tiny_audience_only_fails_at_the_end() {
        let plan = DeliveryPlan::new(1, 0.9, 8);
        assert_eq!(plan.total_sent, 0);
        assert_eq!(plan.progress_at(7).stats.pending, 1);
        assert_eq!(plan.progress_at(8).stats.failed, 1);
    }

    #[test]
    fn zero_steps_is_treated_as_one() {
        let plan = DeliveryPlan::new(10, 0.5, 0);
        assert_eq!(plan.steps, 1);
        assert_eq!(plan.progress_at(1).status, CampaignStatus::Completed);
    }
}
