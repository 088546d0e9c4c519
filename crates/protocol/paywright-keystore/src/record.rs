//! The persisted wallet record.

use base64::Engine as _;
use paywright_crypto::{EncryptedBlob, NONCE_LEN, SALT_LEN, TAG_LEN};
use serde::{Deserialize, Serialize};

use crate::backend::EncryptionMode;
use crate::error::{KeystoreError, Result};

/// One wallet per installation: public address plus the encrypted key.
///
/// Invariant: the raw private key never appears here unencrypted. The
/// `encryption_mode` tag selects the backend; when absent (records written
/// before backends existed) the machine-bound backend is assumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Checksummed public address (0x-prefixed).
    pub address: String,

    /// CAIP-2 network identifier this wallet pays on (e.g. "eip155:8453").
    pub network_id: String,

    /// Which encryption backend protects the key. Absent = legacy machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_mode: Option<EncryptionMode>,

    /// AES-256-GCM ciphertext of the 32-byte private key (base64).
    pub encrypted_key: String,

    /// PBKDF2 salt (base64, 32 bytes).
    pub key_salt: String,

    /// AES-GCM nonce (base64, 12 bytes).
    pub key_iv: String,

    /// AES-GCM authentication tag (base64, 16 bytes).
    pub key_tag: String,
}

impl WalletRecord {
    /// Build a record from an encrypted blob and its salt.
    pub fn new(
        address: String,
        network_id: String,
        mode: EncryptionMode,
        blob: &EncryptedBlob,
        salt: &[u8; SALT_LEN],
    ) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD;
        Self {
            address,
            network_id,
            encryption_mode: Some(mode),
            encrypted_key: b64.encode(&blob.ciphertext),
            key_salt: b64.encode(salt),
            key_iv: b64.encode(blob.nonce),
            key_tag: b64.encode(blob.tag),
        }
    }

    /// The effective backend, defaulting legacy records to machine-bound.
    pub fn mode(&self) -> EncryptionMode {
        self.encryption_mode.unwrap_or_default()
    }

    /// Decode the salt field.
    pub fn salt(&self) -> Result<[u8; SALT_LEN]> {
        decode_fixed(&self.key_salt, "keySalt")
    }

    /// Reassemble the encrypted blob from the persisted fields.
    pub fn encrypted_blob(&self) -> Result<EncryptedBlob> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let ciphertext = b64
            .decode(&self.encrypted_key)
            .map_err(|_| corrupt("encryptedKey"))?;
        let nonce: [u8; NONCE_LEN] = decode_fixed(&self.key_iv, "keyIv")?;
        let tag: [u8; TAG_LEN] = decode_fixed(&self.key_tag, "keyTag")?;
        Ok(EncryptedBlob {
            ciphertext,
            nonce,
            tag,
        })
    }
}

fn decode_fixed<const N: usize>(field: &str, name: &str) -> Result<[u8; N]> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(field)
        .map_err(|_| corrupt(name))?;
    bytes.try_into().map_err(|_| corrupt(name))
}

fn corrupt(field: &str) -> KeystoreError {
    KeystoreError::InvalidKey(format!("corrupt wallet field: {}", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paywright_crypto::{derive_key, encrypt, random_salt};

    fn sample_record(mode: Option<EncryptionMode>) -> WalletRecord {
        let salt = random_salt();
        let key = derive_key(&salt, b"secret input");
        let blob = encrypt(&[0x11; 32], &key).unwrap();
        let mut record = WalletRecord::new(
            "0x0000000000000000000000000000000000000001".into(),
            "eip155:84532".into(),
            mode.unwrap_or_default(),
            &blob,
            &salt,
        );
        record.encryption_mode = mode;
        record
    }

    #[test]
    fn test_record_roundtrip() {
        let record = sample_record(Some(EncryptionMode::Password));
        let json = serde_json::to_string(&record).unwrap();
        let back: WalletRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode(), EncryptionMode::Password);
        assert_eq!(back.encrypted_blob().unwrap(), record.encrypted_blob().unwrap());
        assert_eq!(back.salt().unwrap(), record.salt().unwrap());
    }

    #[test]
    fn test_missing_mode_defaults_to_machine() {
        // A record written before encryption modes existed has no tag.
        let json = r#"{
            "address": "0x0000000000000000000000000000000000000001",
            "networkId": "eip155:8453",
            "encryptedKey": "AA==",
            "keySalt": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
            "keyIv": "AAAAAAAAAAAAAAAA",
            "keyTag": "AAAAAAAAAAAAAAAAAAAAAA=="
        }"#;
        let record: WalletRecord = serde_json::from_str(json).unwrap();
        assert!(record.encryption_mode.is_none());
        assert_eq!(record.mode(), EncryptionMode::Machine);
    }

    #[test]
    fn test_corrupt_field_rejected() {
        let mut record = sample_record(Some(EncryptionMode::Machine));
        record.key_iv = "not-base64!!".into();
        assert!(record.encrypted_blob().is_err());
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let record = sample_record(Some(EncryptionMode::Env));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("networkId"));
        assert!(json.contains("encryptedKey"));
        assert!(json.contains("keySalt"));
        assert!(json.contains("keyIv"));
        assert!(json.contains("keyTag"));
    }
}
