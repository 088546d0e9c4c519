//! Shared command context: storage, wallet, and engine construction.

use std::sync::Arc;

use tracing::warn;

use paywright_engine::{EngineError, HttpFetcher, PaymentEngine};
use paywright_keystore::{BlobStore, FsBlobStore, SessionPromptCache, WalletManager};
use paywright_x402::{HtmlSignalDetector, HttpFacilitator};

use crate::config::CliConfig;
use crate::error::CliResult;

/// Everything a command needs, built once from the loaded config.
pub struct CliContext {
    pub config: CliConfig,
    pub store: Arc<dyn BlobStore>,
    pub wallet: Arc<WalletManager>,
    pub prompts: SessionPromptCache,
}

impl CliContext {
    /// Open the data directory and wallet without touching the network.
    pub fn open(config: CliConfig) -> CliResult<Self> {
        let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::open(&config.storage.data_dir)?);
        let wallet = Arc::new(WalletManager::new(store.clone()));
        Ok(Self {
            config,
            store,
            wallet,
            prompts: SessionPromptCache::new(),
        })
    }

    /// Build the payment engine and run its startup recovery sweep.
    pub async fn engine(&self) -> CliResult<PaymentEngine> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        let facilitator = Arc::new(HttpFacilitator::new().map_err(EngineError::from)?);
        let engine = PaymentEngine::new(
            &self.config.storage.data_dir,
            self.store.clone(),
            self.wallet.clone(),
            fetcher,
            facilitator,
            Arc::new(HtmlSignalDetector),
        );
        let recovered = engine.recover().await?;
        if recovered > 0 {
            warn!(count = recovered, "resolved orphaned pending settlements from a previous run");
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_data_dir() {
        let dir = TempDir::new().unwrap();
        let mut config = CliConfig::default();
        config.storage.data_dir = dir.path().join("state");

        let ctx = CliContext::open(config).unwrap();
        assert!(dir.path().join("state").is_dir());
        assert!(!ctx.wallet.exists());
    }
}
