//! Daemon error types

use thiserror::Error;

/// Main error type for daemon operations
#[derive(Debug, Error)]
pub enum InterceptdError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rule engine error: {0}")]
    Core(#[from] intercept_core::CoreError),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, InterceptdError>;
