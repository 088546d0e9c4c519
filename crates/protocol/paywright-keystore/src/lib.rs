//! Encrypted wallet storage and key resolution.
//!
//! A wallet is one persisted [`WalletRecord`]: the public address, the
//! network it pays on, and the private key encrypted by one of three
//! interchangeable backends:
//!
//! - **Machine-bound**: keyed to a durable machine identity, no interaction.
//! - **Password**: keyed to a user password with a strength policy enforced
//!   at creation time.
//! - **Environment-injected**: keyed to base64 material from an environment
//!   variable, for headless deployments.
//!
//! All three share the PBKDF2 + AES-256-GCM engine in `paywright-crypto`;
//! the active backend is a tag inside the record, and a record without a
//! tag decrypts via the oldest (machine-bound) backend for backward
//! compatibility.
//!
//! Decrypted keys live only in the process-lifetime [`KeyCache`], which
//! deduplicates concurrent resolution attempts and never caches failure.

pub mod backend;
pub mod cache;
pub mod error;
pub mod record;
pub mod store;
pub mod wallet;

pub use backend::{machine_fingerprint, validate_password_strength, EncryptionMode, KdfSecret};
pub use cache::{KeyCache, ResolvedKey, SessionPromptCache};
pub use error::{KeystoreError, Result};
pub use record::WalletRecord;
pub use store::{default_data_dir, BlobStore, FsBlobStore, MemBlobStore};
pub use wallet::WalletManager;

/// Name of the environment variable the env backend reads key material from.
pub const ENV_KEY_VAR: &str = "PAYWRIGHT_WALLET_KEY";

/// Blob name the wallet record is persisted under.
pub const WALLET_BLOB: &str = "wallet.json";
