pub mod dispatch;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod stats;

pub use dispatch::{dispatch, personalize};
pub use orchestrator::{DeliveryOrchestrator, StartOutcome};
pub use plan::DeliveryPlan;
pub use registry::DeliveryRegistry;
pub use stats::StatsAggregator;
