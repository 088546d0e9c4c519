//! Error types for x402 protocol operations.

use thiserror::Error;

/// Result type for x402 operations.
pub type X402Result<T> = Result<T, X402Error>;

/// Errors that can occur while detecting, signing, or settling a payment.
#[derive(Debug, Error)]
pub enum X402Error {
    /// The offer's asset contract is not the expected token for its network.
    #[error("asset mismatch on {network}: offer pays {offered}, expected {expected}")]
    AssetMismatch {
        network: String,
        offered: String,
        expected: String,
    },

    /// The payment network is not supported.
    #[error("unsupported network: {network}")]
    UnsupportedNetwork {
        /// The unsupported network identifier
        network: String,
    },

    /// The payment scheme is not supported.
    #[error("unsupported payment scheme: {scheme}")]
    UnsupportedScheme {
        /// The unsupported scheme name
        scheme: String,
    },

    /// A facilitator URL failed the transport/target safety checks.
    #[error("unsafe facilitator url {url}: {reason}")]
    UnsafeUrl { url: String, reason: String },

    /// The facilitator advertises no usable kind for the offer.
    #[error("facilitator has no supported kind for network {network}")]
    NoSupportedKind { network: String },

    /// An offer or signal is structurally invalid.
    #[error("malformed payment offer: {reason}")]
    MalformedOffer { reason: String },

    /// Signing the transfer authorization failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Facilitator settlement failed, remote-reported reason included.
    #[error("facilitator settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// Facilitator verification failed.
    #[error("facilitator verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// Network/HTTP error communicating with the facilitator.
    #[error("facilitator communication error: {0}")]
    FacilitatorNetwork(String),

    /// Internal error.
    #[error("internal x402 error: {0}")]
    Internal(String),
}

impl X402Error {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FacilitatorNetwork(_))
    }
}

impl From<reqwest::Error> for X402Error {
    fn from(e: reqwest::Error) -> Self {
        Self::FacilitatorNetwork(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_transient() {
        assert!(X402Error::FacilitatorNetwork("timeout".into()).is_transient());
        assert!(!X402Error::SettlementFailed {
            reason: "insufficient funds".into()
        }
        .is_transient());
    }
}
