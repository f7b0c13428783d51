//! Configuration for the plugin kit
//!
//! Plugins receive their credentials through a [`Settings`] map provided by
//! the host runtime, with process environment variables as the fallback.
//! [`WalletConfig::load`] is the validation gate: it either produces a usable
//! signer plus RPC endpoints or a descriptive configuration error.

pub mod rpc;

use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::Address;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Re-export RPC config
pub use rpc::RpcConfig;

/// Settings key / environment variable holding the hex-encoded private key
pub const PRIVATE_KEY_SETTING: &str = "EVM_PRIVATE_KEY";

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Arbitrum,
    Optimism,
    Base,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Ethereum,
        Network::Arbitrum,
        Network::Optimism,
        Network::Base,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Arbitrum => 42161,
            Network::Optimism => 10,
            Network::Base => 8453,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Arbitrum => "arbitrum",
            Network::Optimism => "optimism",
            Network::Base => "base",
        }
    }

    /// Parse a network from its common names ("mainnet" is Ethereum).
    pub fn from_name(name: &str) -> Option<Network> {
        match name.to_ascii_lowercase().as_str() {
            "ethereum" | "mainnet" => Some(Network::Ethereum),
            "arbitrum" => Some(Network::Arbitrum),
            "optimism" => Some(Network::Optimism),
            "base" => Some(Network::Base),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key/value settings handed to plugins by the host runtime.
///
/// Lookups fall back to process environment variables, so the kit works both
/// embedded (runtime passes settings) and standalone (CLI + `.env`).
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings that resolve everything from the environment.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Add an explicit setting (overrides the environment).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    /// Fetch a credential wrapped so it never hits logs via Debug/Display.
    pub fn get_secret(&self, key: &str) -> Option<SecretString> {
        self.get(key).map(SecretString::from)
    }
}

/// Validated wallet configuration: a signer plus RPC endpoints.
///
/// Construction is the schema check. A missing or malformed private key and a
/// malformed RPC URL both surface here as [`Error::Config`] before any
/// executor runs.
#[derive(Debug)]
pub struct WalletConfig {
    pub wallet: SecureWallet,
    pub rpc: RpcConfig,
}

impl WalletConfig {
    pub fn load(settings: &Settings) -> Result<Self> {
        let key = settings.get_secret(PRIVATE_KEY_SETTING).ok_or_else(|| {
            Error::Config(format!(
                "{} is not set; configure it in runtime settings or the environment",
                PRIVATE_KEY_SETTING
            ))
        })?;

        let wallet = SecureWallet::from_hex(key.expose_secret())
            .map_err(|e| Error::Config(format!("{} is invalid: {}", PRIVATE_KEY_SETTING, e)))?;

        let rpc = RpcConfig::from_env().validated()?;

        Ok(Self { wallet, rpc })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

/// Risk thresholds applied by the workflow engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkflowLimits {
    /// Minimum acceptable health factor, now and post-withdrawal
    pub min_health_factor: f64,
    /// Maximum fraction of portfolio value a single withdrawal may take
    pub max_withdrawal_ratio: f64,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            min_health_factor: 1.15,
            max_withdrawal_ratio: 0.8,
        }
    }
}
