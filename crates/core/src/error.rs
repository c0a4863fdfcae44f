use thiserror::Error;

pub type ReachResult<T> = Result<T, ReachError>;

#[derive(Error, Debug)]
pub enum ReachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ReachError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        ReachError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}
