//! Error types for the node maintainer

use thiserror::Error;

/// Main error type for the node maintainer
#[derive(Error, Debug)]
pub enum MaintainerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Inventory error: {0}")]
    InventoryError(String),

    #[error("History error: event at {attempted} precedes last recorded event at {last}")]
    HistoryOrderError {
        last: chrono::DateTime<chrono::Utc>,
        attempted: chrono::DateTime<chrono::Utc>,
    },

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Job control error: {0}")]
    JobControlError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Invalid application id: {0}")]
    InvalidApplicationId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for MaintainerError {
    fn from(err: anyhow::Error) -> Self {
        MaintainerError::Internal(err.to_string())
    }
}
