//! CLI configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use paywright_keystore::default_data_dir;

use crate::error::{CliError, CliResult};

/// CLI configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Payment defaults.
    pub payment: PaymentConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            payment: PaymentConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a file, or defaults if it does not exist.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from the default location.
    pub fn load_default() -> CliResult<Self> {
        Self::load(&default_config_path())
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for wallet, budget, ledger, and receipt state.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Payment defaults, overridable per fetch on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaymentConfig {
    /// Default per-call spending limit in USDC.
    pub default_max_price: Option<String>,
    /// Restrict payments to this network unless overridden.
    pub default_network: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Default config file path: `<data_dir>/config.toml`.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.payment.default_max_price.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = CliConfig::default();
        config.payment.default_max_price = Some("0.10".to_string());
        config.payment.default_network = Some("base".to_string());
        config.save(&path).unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded.payment.default_max_price.as_deref(), Some("0.10"));
        assert_eq!(loaded.payment.default_network.as_deref(), Some("base"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[payment]\ndefault_network = \"base-sepolia\"\n").unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(
            loaded.payment.default_network.as_deref(),
            Some("base-sepolia")
        );
        assert!(loaded.payment.timeout_ms.is_none());
    }
}
