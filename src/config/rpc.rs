//! RPC endpoint configuration
//!
//! Supports multiple configuration methods following Ethereum ecosystem conventions:
//! 1. Per-chain env vars (ETH_RPC_URL, ARBITRUM_RPC_URL, etc.) - highest priority
//! 2. Provider API keys (ALCHEMY_API_KEY, INFURA_API_KEY) - builds URLs automatically
//! 3. Public RPC fallbacks - for testing only
//!
//! # Examples
//!
//! ```bash
//! # Option 1: Per-chain URLs (recommended for production)
//! export ETH_RPC_URL="https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! export ARBITRUM_RPC_URL="https://arb-mainnet.g.alchemy.com/v2/YOUR_KEY"
//!
//! # Option 2: Single provider API key
//! export ALCHEMY_API_KEY="YOUR_KEY"
//!
//! # Option 3: No env vars - uses public RPCs (rate limited, for testing only)
//! ```

use std::collections::HashMap;

/// RPC configuration for multiple chains
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// RPC URLs indexed by chain ID
    urls: HashMap<u64, String>,
}

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const ARBITRUM: u64 = 42161;
    pub const OPTIMISM: u64 = 10;
    pub const BASE: u64 = 8453;
}

/// Per-chain URL env vars (highest priority)
const CHAIN_URL_VARS: [(u64, &str); 4] = [
    (chains::ETHEREUM, "ETH_RPC_URL"),
    (chains::ARBITRUM, "ARBITRUM_RPC_URL"),
    (chains::OPTIMISM, "OPTIMISM_RPC_URL"),
    (chains::BASE, "BASE_RPC_URL"),
];

/// Alchemy subdomain per chain
const ALCHEMY_SLUGS: [(u64, &str); 4] = [
    (chains::ETHEREUM, "eth-mainnet"),
    (chains::ARBITRUM, "arb-mainnet"),
    (chains::OPTIMISM, "opt-mainnet"),
    (chains::BASE, "base-mainnet"),
];

/// Infura subdomain per chain (Infura does not support Base)
const INFURA_SLUGS: [(u64, &str); 3] = [
    (chains::ETHEREUM, "mainnet"),
    (chains::ARBITRUM, "arbitrum-mainnet"),
    (chains::OPTIMISM, "optimism-mainnet"),
];

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    use super::chains;

    pub const FALLBACKS: [(u64, &str); 4] = [
        (chains::ETHEREUM, "https://eth.llamarpc.com"),
        (chains::ARBITRUM, "https://arb1.arbitrum.io/rpc"),
        (chains::OPTIMISM, "https://mainnet.optimism.io"),
        (chains::BASE, "https://mainnet.base.org"),
    ];
}

impl RpcConfig {
    /// Create RPC config from environment variables
    ///
    /// Priority:
    /// 1. Per-chain env vars (ETH_RPC_URL, ARBITRUM_RPC_URL, etc.)
    /// 2. ALCHEMY_API_KEY - builds URLs for all chains
    /// 3. INFURA_API_KEY - builds URLs for supported chains
    /// 4. Public RPC fallbacks (for testing only)
    pub fn from_env() -> Self {
        let mut urls = HashMap::new();

        // Priority 1: per-chain env vars
        for (chain_id, var) in CHAIN_URL_VARS {
            if let Ok(url) = std::env::var(var) {
                tracing::debug!(var, chain_id, "using per-chain RPC URL");
                urls.insert(chain_id, url);
            }
        }

        // Priority 2: if no per-chain vars, try ALCHEMY_API_KEY
        if urls.is_empty() {
            if let Ok(key) = std::env::var("ALCHEMY_API_KEY") {
                tracing::info!("Building RPC URLs from ALCHEMY_API_KEY");
                for (chain_id, slug) in ALCHEMY_SLUGS {
                    urls.insert(chain_id, format!("https://{}.g.alchemy.com/v2/{}", slug, key));
                }
            }
        }

        // Priority 3: if no Alchemy, try INFURA_API_KEY
        if urls.is_empty() {
            if let Ok(key) = std::env::var("INFURA_API_KEY") {
                tracing::info!("Building RPC URLs from INFURA_API_KEY");
                for (chain_id, slug) in INFURA_SLUGS {
                    urls.insert(chain_id, format!("https://{}.infura.io/v3/{}", slug, key));
                }
            }
        }

        // Priority 4: fall back to public RPCs for any missing chains
        if !urls.contains_key(&chains::ETHEREUM) {
            tracing::warn!("No RPC configured for Ethereum, using public RPC (rate limited)");
        }
        for (chain_id, url) in public_rpcs::FALLBACKS {
            urls.entry(chain_id).or_insert_with(|| url.to_string());
        }

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Check every configured URL parses as a valid URL.
    ///
    /// Per-chain env vars are free-form strings; catching a malformed one here
    /// gives a config error instead of a provider error mid-operation.
    pub fn validated(self) -> crate::Result<Self> {
        for (chain_id, url) in &self.urls {
            url::Url::parse(url).map_err(|e| {
                crate::Error::Config(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
            })?;
        }
        Ok(self)
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }

    /// Get all configured chain IDs
    pub fn chains(&self) -> impl Iterator<Item = &u64> {
        self.urls.keys()
    }

    /// Check if a chain is configured
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.urls.contains_key(&chain_id)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_all_chains() {
        // Clear env vars for test
        std::env::remove_var("ETH_RPC_URL");
        std::env::remove_var("ALCHEMY_API_KEY");
        std::env::remove_var("INFURA_API_KEY");

        let config = RpcConfig::from_env();

        assert!(config.has_chain(chains::ETHEREUM));
        assert!(config.has_chain(chains::ARBITRUM));
        assert!(config.has_chain(chains::OPTIMISM));
        assert!(config.has_chain(chains::BASE));
    }

    #[test]
    fn test_get_returns_url() {
        let mut urls = HashMap::new();
        urls.insert(1, "https://custom.rpc".to_string());
        let config = RpcConfig::with_urls(urls);

        assert_eq!(config.get(1), Some("https://custom.rpc"));
        assert_eq!(config.get(999), None);
    }

    #[test]
    fn test_public_rpc_fallbacks() {
        // Clear env vars
        std::env::remove_var("ETH_RPC_URL");
        std::env::remove_var("ALCHEMY_API_KEY");

        let config = RpcConfig::from_env();

        // Should fall back to public RPCs
        assert_eq!(config.get(chains::ETHEREUM), Some("https://eth.llamarpc.com"));
        assert_eq!(
            config.get(chains::ARBITRUM),
            Some("https://arb1.arbitrum.io/rpc")
        );
    }

    #[test]
    fn test_validated_rejects_malformed_url() {
        let mut urls = HashMap::new();
        urls.insert(1, "not a url".to_string());
        let result = RpcConfig::with_urls(urls).validated();
        assert!(result.is_err());

        let mut urls = HashMap::new();
        urls.insert(1, "https://eth.llamarpc.com".to_string());
        assert!(RpcConfig::with_urls(urls).validated().is_ok());
    }
}
