//! Encryption backends: where the key-derivation input comes from.
//!
//! Each backend resolves a [`KdfSecret`] which the shared engine stretches
//! into the AES key. The backend choice is persisted as a tag in the wallet
//! record; everything downstream of secret resolution is identical.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeystoreError, Result};
use crate::ENV_KEY_VAR;

/// Domain separator for the machine fingerprint hash.
const MACHINE_KEY_DOMAIN: &[u8] = b"paywright-machine-key-v1";

/// Minimum password length for the password backend.
const MIN_PASSWORD_LEN: usize = 8;

/// Which encryption backend protects the wallet key.
///
/// Serialized into the wallet record; an absent tag means [`Machine`], the
/// oldest backend, so pre-tag records keep decrypting.
///
/// [`Machine`]: EncryptionMode::Machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Key derived from durable machine identity; no user interaction.
    Machine,
    /// Key derived from a user-supplied password.
    Password,
    /// Key material injected via the process environment.
    Env,
}

impl Default for EncryptionMode {
    fn default() -> Self {
        Self::Machine
    }
}

impl std::fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Machine => write!(f, "machine"),
            Self::Password => write!(f, "password"),
            Self::Env => write!(f, "env"),
        }
    }
}

/// Secret input to key derivation, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KdfSecret(Vec<u8>);

impl KdfSecret {
    /// The raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl EncryptionMode {
    /// Resolve this backend's KDF secret.
    ///
    /// `password` is consulted only by the password backend; the other two
    /// ignore it.
    pub fn resolve_secret(&self, password: Option<&str>) -> Result<KdfSecret> {
        match self {
            Self::Machine => Ok(KdfSecret(machine_fingerprint()?)),
            Self::Password => match password {
                Some(p) => Ok(KdfSecret(p.as_bytes().to_vec())),
                None => Err(KeystoreError::PasswordRequired),
            },
            Self::Env => {
                let raw =
                    std::env::var(ENV_KEY_VAR).map_err(|_| KeystoreError::EnvKeyMissing(ENV_KEY_VAR))?;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(raw.trim())
                    .map_err(|_| KeystoreError::InvalidEnvKey)?;
                Ok(KdfSecret(decoded))
            }
        }
    }
}

/// Derive a deterministic 32-byte fingerprint of this machine.
///
/// Sources, in order: `/etc/machine-id`, `/var/lib/dbus/machine-id`, the DMI
/// product UUID, then the hostname as a last resort. Ciphertext produced by
/// this backend only decrypts on a machine presenting the same identity.
pub fn machine_fingerprint() -> Result<Vec<u8>> {
    let id = read_machine_id()
        .ok_or_else(|| KeystoreError::MachineIdUnavailable("no machine-id source found".into()))?;

    let mut hasher = Sha256::new();
    hasher.update(MACHINE_KEY_DOMAIN);
    hasher.update(id.trim().as_bytes());
    Ok(hasher.finalize().to_vec())
}

fn read_machine_id() -> Option<String> {
    const SOURCES: &[&str] = &[
        "/etc/machine-id",
        "/var/lib/dbus/machine-id",
        "/sys/class/dmi/id/product_uuid",
    ];
    for path in SOURCES {
        if let Ok(contents) = std::fs::read_to_string(path) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}

/// Enforce the minimum password strength policy.
///
/// Checked only when a password wallet is created, imported, or migrated to;
/// unlocking an existing wallet accepts whatever was set.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(KeystoreError::WeakPassword(format!(
            "must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());
    let classes = [has_lower, has_upper, has_digit, has_symbol]
        .iter()
        .filter(|&&b| b)
        .count();

    if classes < 3 {
        return Err(KeystoreError::WeakPassword(
            "must contain at least 3 of: lowercase, uppercase, digits, symbols".into(),
        ));
    }
    Ok(())
}
