//! Engine error taxonomy.
//!
//! Every failure maps to a stable machine-readable code so callers (and the
//! CLI's exit-code table) can branch without parsing messages.

use thiserror::Error;

use paywright_budget::DeclineReason;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the payment engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No wallet exists, or the key cannot be resolved at all.
    #[error("no wallet available: {0}")]
    NoWallet(String),

    /// Wrong password, wrong env key, or wrong machine.
    #[error("wallet decryption failed: {0}")]
    DecryptFailed(String),

    /// Neither a configured budget nor a per-call max price exists.
    #[error("no budget configured and no max price given")]
    NoBudget,

    /// The offer exceeds the caller's explicit price limit.
    #[error("offer of {requested} exceeds max price {limit}")]
    MaxPriceExceeded { requested: String, limit: String },

    /// A configured cap would be exceeded.
    #[error("budget exceeded ({})", kind.code())]
    BudgetExceeded {
        kind: DeclineReason,
        requested: String,
        limit: String,
    },

    /// The offer pays a token that is not the expected asset for its network.
    #[error("asset mismatch: {0}")]
    AssetMismatch(String),

    /// Server-mode signal without a payment submission URL.
    #[error("server-mode payment signal is missing its payment URL")]
    MissingPaymentUrl,

    /// Facilitator unusable: unreachable, unsafe URL, or no supported kind.
    #[error("facilitator error: {0}")]
    FacilitatorError(String),

    /// The facilitator (or the resource, on the 402 path) refused settlement.
    #[error("settlement failed: {0}")]
    SettleFailed(String),

    /// Server-mode payment endpoint rejected the signed payload.
    #[error("payment endpoint returned {status}: {message}")]
    PaymentUrlError { status: u16, message: String },

    /// Transport failure on the initial fetch.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The fetch hit its timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// A payment is already in flight for this context.
    #[error("payment already in progress for context {context}")]
    PaymentInProgress { context: String },

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Persistence or bookkeeping failure.
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code, the contract for exit-code mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoWallet(_) => "no_wallet",
            Self::DecryptFailed(_) => "decrypt_failed",
            Self::NoBudget => "no_budget",
            Self::MaxPriceExceeded { .. } => "max_price_exceeded",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::AssetMismatch(_) => "asset_mismatch",
            Self::MissingPaymentUrl => "missing_payment_url",
            Self::FacilitatorError(_) => "facilitator_error",
            Self::SettleFailed(_) => "settle_failed",
            Self::PaymentUrlError { .. } => "payment_url_error",
            Self::NetworkError(_) => "network_error",
            Self::Timeout { .. } => "timeout",
            Self::PaymentInProgress { .. } => "payment_in_progress",
            Self::Signing(_) => "signing_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The budget sub-reason code, when this is a budget decline.
    pub fn budget_reason(&self) -> Option<&'static str> {
        match self {
            Self::BudgetExceeded { kind, .. } => Some(match kind {
                DeclineReason::PerRequest => "per_request",
                DeclineReason::Daily => "daily",
                DeclineReason::Total => "total",
                DeclineReason::NoBudget => "no_budget",
                DeclineReason::MaxPrice => "max_price",
            }),
            _ => None,
        }
    }
}

impl From<paywright_keystore::KeystoreError> for EngineError {
    fn from(e: paywright_keystore::KeystoreError) -> Self {
        use paywright_keystore::KeystoreError as K;
        match e {
            K::NoWallet => Self::NoWallet("no wallet record found".to_string()),
            K::DecryptFailed => Self::DecryptFailed("authentication failed".to_string()),
            K::PasswordRequired => {
                Self::DecryptFailed("a password is required to unlock this wallet".to_string())
            }
            K::EnvKeyMissing(var) => {
                Self::NoWallet(format!("environment key variable {var} is not set"))
            }
            K::MachineIdUnavailable(reason) => Self::NoWallet(reason),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<paywright_budget::BudgetError> for EngineError {
    fn from(e: paywright_budget::BudgetError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<paywright_x402::X402Error> for EngineError {
    fn from(e: paywright_x402::X402Error) -> Self {
        use paywright_x402::X402Error as X;
        match e {
            X::AssetMismatch { .. } => Self::AssetMismatch(e.to_string()),
            X::SettlementFailed { reason } => Self::SettleFailed(reason),
            X::Signing(reason) => Self::Signing(reason),
            X::UnsafeUrl { .. }
            | X::FacilitatorNetwork(_)
            | X::NoSupportedKind { .. }
            | X::VerificationFailed { .. } => Self::FacilitatorError(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(EngineError::NoBudget.code(), "no_budget");
        assert_eq!(EngineError::MissingPaymentUrl.code(), "missing_payment_url");
        assert_eq!(
            EngineError::Timeout { timeout_ms: 1000 }.code(),
            "timeout"
        );
    }

    #[test]
    fn test_budget_sub_reason() {
        let err = EngineError::BudgetExceeded {
            kind: DeclineReason::Daily,
            requested: "6.00".into(),
            limit: "5.00".into(),
        };
        assert_eq!(err.code(), "budget_exceeded");
        assert_eq!(err.budget_reason(), Some("daily"));
        assert_eq!(EngineError::NoBudget.budget_reason(), None);
    }

    #[test]
    fn test_keystore_mapping() {
        let err: EngineError = paywright_keystore::KeystoreError::DecryptFailed.into();
        assert_eq!(err.code(), "decrypt_failed");
        let err: EngineError = paywright_keystore::KeystoreError::NoWallet.into();
        assert_eq!(err.code(), "no_wallet");
    }
}
