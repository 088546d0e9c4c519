//! Error types for crypto operations.

use thiserror::Error;

/// Errors from key derivation and authenticated encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authentication tag mismatch: wrong key, or tampered ciphertext.
    ///
    /// Raised for any single-bit corruption of ciphertext, nonce, or tag.
    /// Partial plaintext is never returned.
    #[error("decryption failed: authentication tag mismatch")]
    AuthFailed,

    /// Key material has the wrong length.
    #[error("invalid key length: expected 32 bytes, got {len}")]
    InvalidKeyLength {
        /// Actual length in bytes
        len: usize,
    },

    /// Key material is not valid hex/base64.
    #[error("invalid key encoding")]
    InvalidKeyEncoding,

    /// Cipher initialization failed.
    #[error("cipher error: {0}")]
    Cipher(String),
}
