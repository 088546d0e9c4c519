//! Budget configuration with merge-on-write updates.

use std::sync::Arc;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use paywright_keystore::BlobStore;

use crate::amount::{parse_decimal, USDC_DECIMALS};
use crate::error::Result;

/// Blob name the budget config is persisted under.
const BUDGET_BLOB: &str = "budget.json";

/// Optional spending caps, each a human decimal currency string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// Maximum charge for any single request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_request_max: Option<String>,

    /// Maximum total settled per UTC calendar day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_max: Option<String>,

    /// Maximum total settled over the wallet's lifetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_max: Option<String>,
}

impl BudgetConfig {
    /// Whether any cap is configured at all.
    pub fn is_configured(&self) -> bool {
        self.per_request_max.is_some() || self.daily_max.is_some() || self.total_max.is_some()
    }

    /// Merge a partial update into this config; set fields win, unset fields
    /// keep their existing value.
    pub fn merge(&mut self, update: BudgetConfig) {
        if update.per_request_max.is_some() {
            self.per_request_max = update.per_request_max;
        }
        if update.daily_max.is_some() {
            self.daily_max = update.daily_max;
        }
        if update.total_max.is_some() {
            self.total_max = update.total_max;
        }
    }

    /// Per-request cap in smallest units.
    pub fn per_request_units(&self) -> Result<Option<U256>> {
        self.per_request_max
            .as_deref()
            .map(|s| parse_decimal(s, USDC_DECIMALS))
            .transpose()
    }

    /// Daily cap in smallest units.
    pub fn daily_units(&self) -> Result<Option<U256>> {
        self.daily_max
            .as_deref()
            .map(|s| parse_decimal(s, USDC_DECIMALS))
            .transpose()
    }

    /// Lifetime cap in smallest units.
    pub fn total_units(&self) -> Result<Option<U256>> {
        self.total_max
            .as_deref()
            .map(|s| parse_decimal(s, USDC_DECIMALS))
            .transpose()
    }
}

/// Persisted budget config behind the blob store.
pub struct BudgetStore {
    store: Arc<dyn BlobStore>,
}

impl BudgetStore {
    /// Create a store over a blob backend.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Load the config, defaulting to no caps when absent.
    pub fn load(&self) -> Result<BudgetConfig> {
        match self.store.get(BUDGET_BLOB)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BudgetConfig::default()),
        }
    }

    /// Merge-and-save a partial update, validating every set cap parses.
    pub fn update(&self, update: BudgetConfig) -> Result<BudgetConfig> {
        let mut config = self.load()?;
        config.merge(update);
        // Reject unparseable caps before they reach the gate.
        config.per_request_units()?;
        config.daily_units()?;
        config.total_units()?;
        self.store
            .put(BUDGET_BLOB, &serde_json::to_vec_pretty(&config)?)
            .map_err(crate::error::BudgetError::from)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paywright_keystore::MemBlobStore;

    #[test]
    fn test_merge_is_additive() {
        let mut config = BudgetConfig {
            daily_max: Some("5.00".into()),
            ..Default::default()
        };
        config.merge(BudgetConfig {
            per_request_max: Some("0.10".into()),
            ..Default::default()
        });
        assert_eq!(config.daily_max.as_deref(), Some("5.00"));
        assert_eq!(config.per_request_max.as_deref(), Some("0.10"));
        assert!(config.total_max.is_none());
    }

    #[test]
    fn test_merge_overwrites_set_fields() {
        let mut config = BudgetConfig {
            daily_max: Some("5.00".into()),
            ..Default::default()
        };
        config.merge(BudgetConfig {
            daily_max: Some("10.00".into()),
            ..Default::default()
        });
        assert_eq!(config.daily_max.as_deref(), Some("10.00"));
    }

    #[test]
    fn test_store_roundtrip() {
        let store = BudgetStore::new(MemBlobStore::new());
        assert!(!store.load().unwrap().is_configured());

        store
            .update(BudgetConfig {
                daily_max: Some("5.00".into()),
                ..Default::default()
            })
            .unwrap();
        store
            .update(BudgetConfig {
                total_max: Some("100".into()),
                ..Default::default()
            })
            .unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.daily_max.as_deref(), Some("5.00"));
        assert_eq!(config.total_max.as_deref(), Some("100"));
    }

    #[test]
    fn test_update_rejects_bad_amount() {
        let store = BudgetStore::new(MemBlobStore::new());
        let result = store.update(BudgetConfig {
            daily_max: Some("five dollars".into()),
            ..Default::default()
        });
        assert!(result.is_err());
        // Nothing was persisted.
        assert!(!store.load().unwrap().is_configured());
    }
}
