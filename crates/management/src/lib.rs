//! Campaign API backend — audience preview, campaign creation and delivery
//! control, customer/order ingestion, the dashboard and rule/message assist.
//!
//! Data lives behind the repository traits in `reach-core`; the server
//! wires them to the in-memory store.

pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod router;
pub mod server;

pub use handlers::ManagementState;
pub use router::management_router;
pub use server::ApiServer;
