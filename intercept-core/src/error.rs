//! Error types for rule engine operations

use thiserror::Error;

/// Main error type for rule engine operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Provider rejected update: {0}")]
    ProviderRejected(String),

    #[error("Duplicate compiled rule id: {0}")]
    DuplicateRuleId(u32),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
