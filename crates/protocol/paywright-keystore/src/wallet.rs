//! Wallet lifecycle and key resolution.

use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use tracing::info;

use paywright_crypto::{decrypt, derive_key, encrypt, random_salt, PrivateKey};

use crate::backend::{validate_password_strength, EncryptionMode};
use crate::cache::{KeyCache, ResolvedKey};
use crate::error::{KeystoreError, Result};
use crate::record::WalletRecord;
use crate::store::BlobStore;
use crate::WALLET_BLOB;

/// Owns the persisted wallet record and the in-process key cache.
pub struct WalletManager {
    store: Arc<dyn BlobStore>,
    cache: KeyCache,
}

impl WalletManager {
    /// Create a manager over a blob store.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            cache: KeyCache::new(),
        }
    }

    /// Whether a wallet record exists.
    pub fn exists(&self) -> bool {
        matches!(self.store.get(WALLET_BLOB), Ok(Some(_)))
    }

    /// Load the persisted wallet record.
    pub fn load_record(&self) -> Result<WalletRecord> {
        let bytes = self.store.get(WALLET_BLOB)?.ok_or(KeystoreError::NoWallet)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Generate a fresh wallet encrypted under the chosen backend.
    pub fn create(
        &self,
        network_id: &str,
        mode: EncryptionMode,
        password: Option<&str>,
    ) -> Result<WalletRecord> {
        if self.exists() {
            return Err(KeystoreError::WalletExists);
        }
        let signer = PrivateKeySigner::random();
        let key = PrivateKey::from_bytes(signer.to_bytes().0);
        self.store_key(&key, signer.address(), network_id, mode, password)
    }

    /// Import an existing private key (64-char hex, optional 0x prefix).
    pub fn import(
        &self,
        key_hex: &str,
        network_id: &str,
        mode: EncryptionMode,
        password: Option<&str>,
    ) -> Result<WalletRecord> {
        if self.exists() {
            return Err(KeystoreError::WalletExists);
        }
        let key = PrivateKey::from_hex(key_hex)
            .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
        let address = address_for(&key)?;
        self.store_key(&key, address, network_id, mode, password)
    }

    /// Re-encrypt the wallet under a different backend.
    ///
    /// The key is decrypted with the current backend, re-encrypted with the
    /// new one, and the old ciphertext is replaced in a single record write.
    pub async fn migrate(
        &self,
        new_mode: EncryptionMode,
        current_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<WalletRecord> {
        let record = self.load_record()?;
        let resolved = self.resolve_private_key(current_password).await?;

        if new_mode == EncryptionMode::Password {
            let pw = new_password.ok_or(KeystoreError::PasswordRequired)?;
            validate_password_strength(pw)?;
        }

        let salt = random_salt();
        let secret = new_mode.resolve_secret(new_password)?;
        let sym = derive_key(&salt, secret.as_bytes());
        let blob = encrypt(resolved.key.as_bytes(), &sym)?;

        let new_record = WalletRecord::new(
            record.address.clone(),
            record.network_id.clone(),
            new_mode,
            &blob,
            &salt,
        );
        self.store
            .put(WALLET_BLOB, &serde_json::to_vec_pretty(&new_record)?)?;

        info!(mode = %new_mode, address = %new_record.address, "wallet migrated to new encryption backend");
        Ok(new_record)
    }

    /// Delete the wallet record and wipe the cached key.
    pub async fn delete(&self) -> Result<()> {
        if !self.exists() {
            return Err(KeystoreError::NoWallet);
        }
        self.store.delete(WALLET_BLOB)?;
        self.cache.clear().await;
        Ok(())
    }

    /// Resolve the decrypted private key, through the single-flight cache.
    ///
    /// `password` is consulted only when the record's backend is the
    /// password backend. Cryptographic failures are surfaced, never retried.
    pub async fn resolve_private_key(&self, password: Option<&str>) -> Result<ResolvedKey> {
        self.cache
            .get_or_resolve(|| async {
                let record = self.load_record()?;
                let mode = record.mode();
                let secret = mode.resolve_secret(password)?;
                let sym = derive_key(&record.salt()?, secret.as_bytes());
                let plaintext = decrypt(&record.encrypted_blob()?, &sym)?;

                let bytes: [u8; 32] = plaintext
                    .as_slice()
                    .try_into()
                    .map_err(|_| KeystoreError::InvalidKey("decrypted key is not 32 bytes".into()))?;
                let key = PrivateKey::from_bytes(bytes);
                let address = address_for(&key)?;
                Ok(ResolvedKey { key, address })
            })
            .await
    }

    /// Wipe the cached key; the next resolution decrypts again.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn store_key(
        &self,
        key: &PrivateKey,
        address: Address,
        network_id: &str,
        mode: EncryptionMode,
        password: Option<&str>,
    ) -> Result<WalletRecord> {
        if mode == EncryptionMode::Password {
            let pw = password.ok_or(KeystoreError::PasswordRequired)?;
            validate_password_strength(pw)?;
        }

        let salt = random_salt();
        let secret = mode.resolve_secret(password)?;
        let sym = derive_key(&salt, secret.as_bytes());
        let blob = encrypt(key.as_bytes(), &sym)?;

        let record = WalletRecord::new(
            address.to_checksum(None),
            network_id.to_string(),
            mode,
            &blob,
            &salt,
        );
        self.store
            .put(WALLET_BLOB, &serde_json::to_vec_pretty(&record)?)?;

        info!(address = %record.address, mode = %mode, "wallet created");
        Ok(record)
    }
}

fn address_for(key: &PrivateKey) -> Result<Address> {
    let signer = PrivateKeySigner::from_slice(key.as_bytes())
        .map_err(|e| KeystoreError::InvalidKey(e.to_string()))?;
    Ok(signer.address())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemBlobStore;

    const NETWORK: &str = "eip155:84532";
    const PASSWORD: &str = "Correct.Horse1";

    fn manager() -> (WalletManager, Arc<MemBlobStore>) {
        let store = MemBlobStore::new();
        (WalletManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_and_resolve_with_password() {
        let (wallet, store) = manager();
        let record = wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();

        let resolved = wallet.resolve_private_key(Some(PASSWORD)).await.unwrap();
        assert_eq!(resolved.key.to_hex().len(), 64);
        assert_eq!(resolved.address.to_checksum(None), record.address);

        // The persisted blob never contains the raw key hex.
        let blob = String::from_utf8(store.get(WALLET_BLOB).unwrap().unwrap()).unwrap();
        assert!(!blob.contains(&resolved.key.to_hex()));
    }

    #[tokio::test]
    async fn test_wrong_password_fails_and_is_retriable() {
        let (wallet, _) = manager();
        wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();

        let result = wallet.resolve_private_key(Some("Wrong.Pass1")).await;
        assert!(matches!(result, Err(KeystoreError::DecryptFailed)));

        // Failure was not cached; the right password still works.
        assert!(wallet.resolve_private_key(Some(PASSWORD)).await.is_ok());
    }

    #[tokio::test]
    async fn test_weak_password_rejected_at_creation() {
        let (wallet, _) = manager();
        let result = wallet.create(NETWORK, EncryptionMode::Password, Some("abc"));
        assert!(matches!(result, Err(KeystoreError::WeakPassword(_))));
        assert!(!wallet.exists());
    }

    #[tokio::test]
    async fn test_import_known_key() {
        let (wallet, _) = manager();
        // Deterministic key so the derived address is stable.
        let key_hex = "4c0883a69102937d6231471b5dbb6204fe51296170827936ea5cce4b76994b0f";
        wallet
            .import(key_hex, NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();

        let resolved = wallet.resolve_private_key(Some(PASSWORD)).await.unwrap();
        assert_eq!(resolved.key.to_hex(), key_hex);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let (wallet, _) = manager();
        wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();
        let result = wallet.create(NETWORK, EncryptionMode::Password, Some(PASSWORD));
        assert!(matches!(result, Err(KeystoreError::WalletExists)));
    }

    #[tokio::test]
    async fn test_migrate_password_to_password() {
        let (wallet, _) = manager();
        wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();
        let before = wallet.resolve_private_key(Some(PASSWORD)).await.unwrap();

        let new_password = "Totally.New9";
        let record = wallet
            .migrate(EncryptionMode::Password, Some(PASSWORD), Some(new_password))
            .await
            .unwrap();
        assert_eq!(record.mode(), EncryptionMode::Password);

        // Same key under the new password, in a fresh process (new cache).
        let wallet2 = WalletManager::new(wallet.store.clone());
        let after = wallet2.resolve_private_key(Some(new_password)).await.unwrap();
        assert_eq!(before.key.to_hex(), after.key.to_hex());

        let wrong = WalletManager::new(wallet.store.clone());
        assert!(wrong.resolve_private_key(Some(PASSWORD)).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_wallet() {
        let (wallet, _) = manager();
        wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();
        wallet.delete().await.unwrap();
        assert!(!wallet.exists());
        assert!(matches!(
            wallet.resolve_private_key(Some(PASSWORD)).await,
            Err(KeystoreError::NoWallet)
        ));
    }

    #[tokio::test]
    async fn test_resolve_without_wallet() {
        let (wallet, _) = manager();
        let result = wallet.resolve_private_key(None).await;
        assert!(matches!(result, Err(KeystoreError::NoWallet)));
    }

    #[tokio::test]
    async fn test_password_required_when_missing() {
        let (wallet, _) = manager();
        wallet
            .create(NETWORK, EncryptionMode::Password, Some(PASSWORD))
            .unwrap();
        let result = wallet.resolve_private_key(None).await;
        assert!(matches!(result, Err(KeystoreError::PasswordRequired)));
    }
}
