//! Per-network asset allow-list.
//!
//! An offer is only payable when its token contract is the known stablecoin
//! for its network. Paying an arbitrary contract a page names would let a
//! malicious site drain approvals for unknown tokens.

use crate::error::{X402Error, X402Result};

/// Static parameters for a supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    /// CAIP-2 identifier ("eip155:8453").
    pub caip2: &'static str,
    /// Short alias pages and CLIs use ("base").
    pub alias: &'static str,
    /// EVM chain id.
    pub chain_id: u64,
    /// USDC contract address on this network.
    pub usdc: &'static str,
    /// Block-explorer base URL for tx links.
    pub explorer: &'static str,
}

const CHAINS: &[ChainInfo] = &[
    ChainInfo {
        caip2: "eip155:8453",
        alias: "base",
        chain_id: 8453,
        usdc: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        explorer: "https://basescan.org",
    },
    ChainInfo {
        caip2: "eip155:84532",
        alias: "base-sepolia",
        chain_id: 84532,
        usdc: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        explorer: "https://sepolia.basescan.org",
    },
];

/// Look up a network by CAIP-2 id or short alias.
pub fn chain_for(network: &str) -> Option<&'static ChainInfo> {
    CHAINS
        .iter()
        .find(|c| c.caip2.eq_ignore_ascii_case(network) || c.alias.eq_ignore_ascii_case(network))
}

/// Check that the offered asset is the expected token for the network.
pub fn validate_asset(network: &str, asset: &str) -> X402Result<&'static ChainInfo> {
    let chain = chain_for(network).ok_or_else(|| X402Error::UnsupportedNetwork {
        network: network.to_string(),
    })?;
    if !chain.usdc.eq_ignore_ascii_case(asset) {
        return Err(X402Error::AssetMismatch {
            network: network.to_string(),
            offered: asset.to_string(),
            expected: chain.usdc.to_string(),
        });
    }
    Ok(chain)
}

/// Explorer link for a settled transaction, when a reference exists.
pub fn explorer_tx_url(network: &str, tx: &str) -> Option<String> {
    chain_for(network).map(|c| format!("{}/tx/{}", c.explorer, tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_lookup_by_caip2_and_alias() {
        assert_eq!(chain_for("eip155:8453").unwrap().chain_id, 8453);
        assert_eq!(chain_for("base").unwrap().chain_id, 8453);
        assert_eq!(chain_for("base-sepolia").unwrap().chain_id, 84532);
        assert!(chain_for("eip155:1").is_none());
    }

    #[test]
    fn test_validate_asset_accepts_usdc_any_case() {
        let usdc = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
        assert!(validate_asset("base", usdc).is_ok());
    }

    #[test]
    fn test_validate_asset_rejects_unknown_token() {
        let err = validate_asset("base", "0x00000000000000000000000000000000deadbeef")
            .unwrap_err();
        assert!(matches!(err, X402Error::AssetMismatch { .. }));
    }

    #[test]
    fn test_validate_asset_rejects_unknown_network() {
        let err = validate_asset("eip155:1", "0x0").unwrap_err();
        assert!(matches!(err, X402Error::UnsupportedNetwork { .. }));
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(
            explorer_tx_url("base", "0xabc").as_deref(),
            Some("https://basescan.org/tx/0xabc")
        );
        assert!(explorer_tx_url("eip155:1", "0xabc").is_none());
    }
}
