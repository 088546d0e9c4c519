//! Budget error types.

use thiserror::Error;

/// Result type for budget operations.
pub type Result<T> = std::result::Result<T, BudgetError>;

/// Errors from budget config, ledger, and lock handling.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// A decimal currency string could not be parsed.
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount {
        /// The offending input
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// Blob store failure.
    #[error("storage error: {0}")]
    Store(String),

    /// Lock file I/O failure.
    #[error("lock error: {0}")]
    Lock(#[from] std::io::Error),

    /// Ledger or config record is not valid JSON.
    #[error("corrupt record: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<paywright_keystore::KeystoreError> for BudgetError {
    fn from(e: paywright_keystore::KeystoreError) -> Self {
        Self::Store(e.to_string())
    }
}
