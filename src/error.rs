use thiserror::Error;

use crate::domain::GameNumber;

/// Main error type for the prediction desk
#[derive(Error, Debug)]
pub enum TableauError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt schedule record: {0}")]
    CorruptRecord(String),

    // Collaborator errors (send/edit)
    #[error("Outbound delivery failed: {0}")]
    Outbound(String),

    #[error("No display channel configured")]
    NoDisplayChannel,

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Prediction not found: #{0}")]
    PredictionNotFound(GameNumber),

    #[error("Prediction already resolved: #{0}")]
    AlreadyResolved(GameNumber),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TableauError
pub type Result<T> = std::result::Result<T, TableauError>;
