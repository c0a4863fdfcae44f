//! In-process registry of delivery runs, keyed by campaign id.
//!
//! The persisted marker on the campaign decides who may run; the registry
//! only holds what is needed to stop or await a run owned by this process.

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct DeliveryRegistry {
    runs: DashMap<Uuid, ActiveRun>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run before its task is spawned and hand back its token.
    pub(crate) fn register(&self, campaign_id: Uuid, run_id: Uuid) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.runs.insert(
            campaign_id,
            ActiveRun {
                run_id,
                cancel: cancel.clone(),
                handle: None,
            },
        );
        cancel
    }

    /// Attach the spawned task. A run that already finished has removed
    /// itself, in which case the handle is simply dropped.
    pub(crate) fn attach(&self, campaign_id: Uuid, run_id: Uuid, handle: JoinHandle<()>) {
        if let Some(mut run) = self.runs.get_mut(&campaign_id) {
            if run.run_id == run_id {
                run.handle = Some(handle);
            }
        }
    }

    pub(crate) fn finish(&self, campaign_id: Uuid, run_id: Uuid) {
        self.runs.remove_if(&campaign_id, |_, run| run.run_id == run_id);
    }

    pub fn is_running(&self, campaign_id: Uuid) -> bool {
        self.runs.contains_key(&campaign_id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Signal the campaign's run to stop at its next step boundary.
    /// Returns `false` when this process has no run for the campaign.
    pub fn cancel(&self, campaign_id: Uuid) -> bool {
        match self.runs.get(&campaign_id) {
            Some(run) => {
                run.cancel.cancel();
                info!(campaign_id = %campaign_id, run_id = %run.run_id, "Delivery run cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every run and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        let mut handles = Vec::new();
        for mut run in self.runs.iter_mut() {
            run.cancel.cancel();
            if let Some(handle) = run.handle.take() {
                handles.push(handle);
            }
        }
        info!(runs = handles.len(), "Cancelling delivery runs");
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Delivery task panicked");
            }
        }
    }

    /// Await the campaign's current run, if any.
    pub async fn wait(&self, campaign_id: Uuid) {
        let handle = self
            .runs
            .get_mut(&campaign_id)
            .and_then(|mut run| run.handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(campaign_id = %campaign_id, error = %e, "Delivery task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_ignores_stale_run_ids() {
        let registry = DeliveryRegistry::new();
        let campaign = Uuid::new_v4();
        let current = Uuid::new_v4();
        registry.register(campaign, current);

        registry.finish(campaign, Uuid::new_v4());
        assert!(registry.is_running(campaign));

        registry.finish(campaign, current);
        assert!(!registry.is_running(campaign));
    }

    #[tokio::test]
    async fn cancel_trips_the_token() {
        let registry = DeliveryRegistry::new();
        let campaign = Uuid::new_v4();
        let token = registry.register(campaign, Uuid::new_v4());
        assert!(!token.is_cancelled());
        assert!(registry.cancel(campaign));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn shutdown_waits_for_tasks() {
        let registry = DeliveryRegistry::new();
        let campaign = Uuid::new_v4();
        let run_id = Uuid::new_v4();
        let token = registry.register(campaign, run_id);
        let handle = tokio::spawn(async move { token.cancelled().await });
        registry.attach(campaign, run_id, handle);

        registry.shutdown().await;
        assert_eq!(registry.len(), 1);
    }
}
