//! Process-lifetime key and prompt caches.
//!
//! [`KeyCache`] memoizes the decrypted key for the life of the process and
//! deduplicates concurrent resolution attempts: the tokio mutex is held
//! across the resolver future, so N concurrent callers produce exactly one
//! decrypt attempt (and, for the password backend, one prompt). A failed
//! resolution is never cached, so a mistyped password can simply be retried.
//!
//! [`SessionPromptCache`] is the interactive companion: it remembers what
//! the user typed per wallet address for the rest of the session, whether or
//! not that password turned out to be correct.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex as StdMutex;

use alloy_primitives::Address;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroize;

use paywright_crypto::PrivateKey;

use crate::error::Result;

/// A decrypted private key plus its cached public address.
///
/// In-memory only. The key bytes are zeroized when the last clone drops.
#[derive(Clone)]
pub struct ResolvedKey {
    /// The decrypted private key.
    pub key: PrivateKey,
    /// Public address derived from the key.
    pub address: Address,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Single-flight, process-lifetime cache for the resolved key.
#[derive(Default)]
pub struct KeyCache {
    slot: Mutex<Option<ResolvedKey>>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key, or run `resolve` to produce one.
    ///
    /// Concurrent callers share a single resolution attempt: the first
    /// caller runs the resolver while the rest wait on the lock, then read
    /// the cached result. Failure leaves the cache empty so the next call
    /// retries.
    pub async fn get_or_resolve<F, Fut>(&self, resolve: F) -> Result<ResolvedKey>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolvedKey>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }

        let resolved = resolve().await?;
        debug!(address = %resolved.address, "wallet key resolved and cached");
        *slot = Some(resolved.clone());
        Ok(resolved)
    }

    /// Peek at the cached key without resolving.
    pub async fn get(&self) -> Option<ResolvedKey> {
        self.slot.lock().await.clone()
    }

    /// Wipe the cached key's bytes and drop the cache entry.
    ///
    /// Best-effort memory hygiene for exit and interrupt paths; clones held
    /// elsewhere are wiped when they drop.
    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(resolved) = slot.take() {
            let mut key = resolved.key;
            key.zeroize();
            debug!("wallet key cache cleared");
        }
    }
}

/// Session-scoped memo of entered passwords, keyed by lowercase address.
///
/// Interactive contexts only. Deliberately independent of whether key
/// resolution succeeded: repeated operations against the same wallet reuse
/// the entry instead of re-prompting, and a wrong entry is replaced when the
/// user types again.
#[derive(Default)]
pub struct SessionPromptCache {
    entries: StdMutex<HashMap<String, String>>,
}

impl SessionPromptCache {
    /// Create an empty prompt cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the remembered password for an address.
    pub fn get(&self, address: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&address.to_lowercase())
            .cloned()
    }

    /// Remember a password for an address.
    pub fn insert(&self, address: &str, password: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(address.to_lowercase(), password.to_string());
    }

    /// Forget a remembered password (e.g. after a definitive wrong-password error).
    pub fn remove(&self, address: &str) {
        self.entries.lock().unwrap().remove(&address.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeystoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_key() -> ResolvedKey {
        ResolvedKey {
            key: PrivateKey::from_bytes([0x22; 32]),
            address: Address::ZERO,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_resolver() {
        let cache = KeyCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_resolve(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(test_key())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let cache = Arc::new(KeyCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_resolve(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Slow resolver: all callers pile up behind the lock.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(test_key())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = KeyCache::new();
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_resolve(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(KeystoreError::DecryptFailed)
            })
            .await;
        assert!(result.is_err());

        // A subsequent call re-invokes the resolver.
        cache
            .get_or_resolve(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(test_key())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_forces_re_resolution() {
        let cache = KeyCache::new();
        let calls = AtomicUsize::new(0);

        let resolve = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(test_key())
        };
        cache.get_or_resolve(resolve).await.unwrap();
        cache.clear().await;
        assert!(cache.get().await.is_none());

        cache
            .get_or_resolve(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(test_key())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_prompt_cache_case_insensitive() {
        let cache = SessionPromptCache::new();
        cache.insert("0xAbCd", "pw1");
        assert_eq!(cache.get("0xabcd").as_deref(), Some("pw1"));
        assert_eq!(cache.get("0xABCD").as_deref(), Some("pw1"));

        cache.remove("0xABCd");
        assert!(cache.get("0xabcd").is_none());
    }

    #[test]
    fn test_prompt_cache_overwrites() {
        let cache = SessionPromptCache::new();
        cache.insert("0x1", "first");
        cache.insert("0x1", "second");
        assert_eq!(cache.get("0x1").as_deref(), Some("second"));
    }
}
