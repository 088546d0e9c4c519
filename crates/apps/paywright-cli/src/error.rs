//! CLI error types.

use paywright_engine::EngineError;
use thiserror::Error;

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error enum wrapping all crate errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine error.
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// Keystore error.
    #[error("{0}")]
    Keystore(#[from] paywright_keystore::KeystoreError),

    /// Budget error.
    #[error("{0}")]
    Budget(#[from] paywright_budget::BudgetError),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// User-facing error with actionable message.
    #[error("{0}")]
    User(String),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a user-facing error.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Get the exit code for this error.
    ///
    /// Engine errors map one code per machine-readable error kind so scripts
    /// can branch without parsing text.
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors: 1
            Self::User(_) => 1,
            // Config errors: 3
            Self::Config(_) | Self::Toml(_) => 3,
            // Wallet/key errors: 10-12
            Self::Keystore(_) => 10,
            Self::Engine(e) => engine_exit_code(e),
            // Budget persistence errors: 6
            Self::Budget(_) => 6,
            // IO errors: 9
            Self::Io(_) => 9,
            // JSON/format errors: 8
            Self::Json(_) => 8,
        }
    }

    /// The machine-readable error code, when one exists.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Engine(e) => Some(e.code()),
            _ => None,
        }
    }
}

fn engine_exit_code(e: &EngineError) -> i32 {
    match e.code() {
        "no_wallet" => 10,
        "decrypt_failed" => 11,
        "signing_failed" => 12,
        "no_budget" => 20,
        "max_price_exceeded" => 21,
        "budget_exceeded" => 22,
        "asset_mismatch" => 23,
        "missing_payment_url" => 24,
        "payment_in_progress" => 25,
        "facilitator_error" => 30,
        "settle_failed" => 31,
        "payment_url_error" => 32,
        "network_error" => 40,
        "timeout" => 41,
        _ => 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_codes_are_distinct() {
        let errs = [
            EngineError::NoBudget,
            EngineError::MissingPaymentUrl,
            EngineError::NoWallet("no wallet".into()),
            EngineError::Timeout { timeout_ms: 30_000 },
        ];
        let codes: Vec<i32> = errs.iter().map(engine_exit_code).collect();
        let mut deduped = codes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(codes.len(), deduped.len());
    }

    #[test]
    fn test_user_error_exit_code() {
        assert_eq!(CliError::user("nope").exit_code(), 1);
    }
}
