//! Slow key derivation for wallet encryption.
//!
//! All three encryption backends feed their secret (password, machine
//! fingerprint, or env-injected bytes) through the same PBKDF2-HMAC-SHA256
//! stretch. The iteration count is fixed protocol-wide; changing it would
//! make existing wallet files undecryptable.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::SymmetricKey;

/// PBKDF2 iteration count (OWASP 2023 recommendation for SHA-256).
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Derive a 32-byte AES key from a secret and a salt.
///
/// Deterministic: the same (salt, input) pair always yields the same key.
pub fn derive_key(salt: &[u8; SALT_LEN], input: &[u8]) -> SymmetricKey {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(input, salt, PBKDF2_ITERATIONS, &mut out);
    SymmetricKey::from_bytes(out)
}

/// Generate a fresh random salt from the OS CSPRNG.
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(&salt, b"password");
        let b = derive_key(&salt, b"password");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_derive_key_salt_sensitivity() {
        let a = derive_key(&[1u8; SALT_LEN], b"password");
        let b = derive_key(&[2u8; SALT_LEN], b"password");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_derive_key_input_sensitivity() {
        let salt = [3u8; SALT_LEN];
        let a = derive_key(&salt, b"password");
        let b = derive_key(&salt, b"Password");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_random_salt_unique() {
        assert_ne!(random_salt(), random_salt());
    }
}
