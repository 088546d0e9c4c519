//! Cryptographic primitives for paywright wallets.
//!
//! This crate provides the shared engine behind every encryption backend:
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256 with a fixed, deliberately slow
//!   iteration count, so brute-forcing a password against a stolen wallet
//!   file is expensive.
//! - **Authenticated encryption**: AES-256-GCM with a random 12-byte nonce
//!   and a 16-byte authentication tag stored alongside the ciphertext.
//!   Decryption fails closed on any tag mismatch.
//! - **Zeroizing key types**: symmetric keys and decrypted private keys are
//!   wiped from memory on drop.
//!
//! # Example
//!
//! ```
//! use paywright_crypto::{derive_key, encrypt, decrypt, random_salt};
//!
//! let salt = random_salt();
//! let key = derive_key(&salt, b"correct horse battery staple");
//! let blob = encrypt(b"secret key material", &key).unwrap();
//! let plain = decrypt(&blob, &key).unwrap();
//! assert_eq!(plain, b"secret key material");
//! ```

mod aead;
mod error;
mod kdf;

pub use aead::{decrypt, encrypt, EncryptedBlob, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{derive_key, random_salt, PBKDF2_ITERATIONS, SALT_LEN};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// A derived 32-byte symmetric encryption key.
///
/// Wiped from memory on drop. `Debug` output is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Create a symmetric key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// A decrypted secp256k1 private key (32 bytes).
///
/// Exists in memory only; the persisted wallet record holds it encrypted.
/// Implements Zeroize + ZeroizeOnDrop so key material is cleared when the
/// value goes out of scope.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Create a PrivateKey from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a PrivateKey from a 64-character hex string (optional 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength { len: bytes.len() });
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Get the raw bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encode the key (64 lowercase chars, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_hex_roundtrip() {
        let key = PrivateKey::from_bytes([0xab; 32]);
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        let back = PrivateKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), back.as_bytes());
    }

    #[test]
    fn test_private_key_hex_with_prefix() {
        let key = PrivateKey::from_hex(&format!("0x{}", "11".repeat(32))).unwrap();
        assert_eq!(key.as_bytes(), &[0x11; 32]);
    }

    #[test]
    fn test_private_key_bad_length() {
        let result = PrivateKey::from_hex("deadbeef");
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { .. })));
    }

    #[test]
    fn test_debug_redacted() {
        let key = PrivateKey::from_bytes([0x42; 32]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }

    #[test]
    fn test_keys_zeroize() {
        use zeroize::Zeroize;
        let mut key = PrivateKey::from_bytes([0x42; 32]);
        key.zeroize();
        assert!(key.as_bytes().iter().all(|&b| b == 0));
    }
}
