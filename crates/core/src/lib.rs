pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::{ReachError, ReachResult};
pub use store::{
    CampaignRepository, CommunicationLogRepository, CustomerRepository, InMemoryStore,
    OrderRepository,
};
