//! Keystore error types.

use thiserror::Error;

/// Result type for keystore operations.
pub type Result<T> = std::result::Result<T, KeystoreError>;

/// Errors from wallet storage and key resolution.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// No wallet record exists.
    #[error("no wallet found; create or import one first")]
    NoWallet,

    /// A wallet record already exists.
    #[error("wallet already exists; delete it before creating a new one")]
    WalletExists,

    /// Decryption failed: wrong password, wrong machine, or wrong env key.
    #[error("failed to decrypt wallet key: wrong password, key, or machine")]
    DecryptFailed,

    /// Password backend selected but no password is available.
    #[error("password required to unlock this wallet")]
    PasswordRequired,

    /// Password does not meet the minimum strength policy.
    #[error("password too weak: {0}")]
    WeakPassword(String),

    /// Env backend selected but the environment variable is absent.
    #[error("environment variable {0} is not set")]
    EnvKeyMissing(&'static str),

    /// Env key material is not valid base64.
    #[error("environment key material is not valid base64")]
    InvalidEnvKey,

    /// No durable machine identity could be found.
    #[error("machine identity unavailable: {0}")]
    MachineIdUnavailable(String),

    /// Imported or decrypted key material is malformed.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Underlying crypto failure other than tag mismatch.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Blob store I/O failure.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Wallet record is not valid JSON.
    #[error("corrupt wallet record: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<paywright_crypto::CryptoError> for KeystoreError {
    fn from(e: paywright_crypto::CryptoError) -> Self {
        match e {
            paywright_crypto::CryptoError::AuthFailed => Self::DecryptFailed,
            other => Self::Crypto(other.to_string()),
        }
    }
}
