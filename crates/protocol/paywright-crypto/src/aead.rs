//! Authenticated encryption for wallet key material.
//!
//! AES-256-GCM with a random 12-byte nonce. The 16-byte GCM tag is split
//! from the ciphertext so the persisted wallet record can carry ciphertext,
//! nonce, and tag as separate fields.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result, SymmetricKey};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Output of authenticated encryption: the pieces a wallet record persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Ciphertext without the trailing tag.
    pub ciphertext: Vec<u8>,
    /// Random per-encryption nonce.
    pub nonce: [u8; NONCE_LEN],
    /// GCM authentication tag.
    pub tag: [u8; TAG_LEN],
}

/// Encrypt plaintext under a symmetric key with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the tag to the ciphertext; split it off for storage.
    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Cipher("encryption failed".into()))?;
    if combined.len() < TAG_LEN {
        return Err(CryptoError::Cipher("ciphertext shorter than tag".into()));
    }
    let tag_start = combined.len() - TAG_LEN;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&combined[tag_start..]);
    combined.truncate(tag_start);

    Ok(EncryptedBlob {
        ciphertext: combined,
        nonce: nonce_bytes,
        tag,
    })
}

/// Decrypt a blob, verifying its authentication tag.
///
/// Fails closed: any mismatch in ciphertext, nonce, or tag yields
/// [`CryptoError::AuthFailed`] and no plaintext.
pub fn decrypt(blob: &EncryptedBlob, key: &SymmetricKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;

    let mut combined = Vec::with_capacity(blob.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&blob.ciphertext);
    combined.extend_from_slice(&blob.tag);

    let nonce = Nonce::from_slice(&blob.nonce);
    cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|_| CryptoError::AuthFailed)
}
