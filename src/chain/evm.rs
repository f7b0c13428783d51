//! EVM client: balances, transfers, transaction submission
//!
//! SECURITY NOTE:
//! - Balance queries are READ-ONLY and use public addresses only
//! - Submission borrows a SecureWallet; keys never leave the signer

use crate::config::RpcConfig;
use crate::retry::RetryPolicy;
use crate::tokens::{self, TokenInfo};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use futures::future::join_all;
use serde::Serialize;

/// ERC20 balanceOf(address) selector
const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// ERC20 transfer(address,uint256) selector
const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// One balance row in a wallet summary
#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub symbol: String,
    /// None for the chain's native asset
    pub token: Option<Address>,
    pub raw: String,
    pub formatted: String,
    pub decimals: u8,
    pub is_native: bool,
}

/// Client for balance queries and transaction submission on EVM chains
#[derive(Debug, Clone)]
pub struct EvmClient {
    rpc: RpcConfig,
}

impl EvmClient {
    pub fn new(rpc: RpcConfig) -> Self {
        Self { rpc }
    }

    pub fn from_env() -> Self {
        Self::new(RpcConfig::from_env())
    }

    fn rpc_url(&self, chain_id: u64) -> Result<url::Url> {
        let raw = self
            .rpc
            .get(chain_id)
            .ok_or_else(|| Error::Config(format!("No RPC URL configured for chain {}", chain_id)))?;
        raw.parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL for chain {}: {}", chain_id, e)))
    }

    /// Get native ETH balance
    pub async fn native_balance(&self, chain_id: u64, owner: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url(chain_id)?);

        provider
            .get_balance(owner)
            .await
            .map_err(|e| Error::Chain(format!("Failed to get balance: {}", e)))
    }

    /// Get an ERC20 balance using eth_call with hand-encoded calldata
    pub async fn erc20_balance(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url(chain_id)?);

        let calldata = super::encode_call(BALANCE_OF, &[super::address_word(owner)]);
        let tx = TransactionRequest::default()
            .to(token)
            .input(Bytes::from(calldata).into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| Error::Chain(format!("Failed to get token balance: {}", e)))?;

        // balanceOf returns a single uint256 word
        if result.len() >= 32 {
            Ok(U256::from_be_slice(&result[..32]))
        } else {
            Ok(U256::ZERO)
        }
    }

    /// Fetch native + known-token balances concurrently, skipping zeros.
    ///
    /// Individual token failures degrade to a warning rather than failing the
    /// whole summary.
    pub async fn balances(&self, chain_id: u64, owner: Address) -> Result<Vec<TokenBalance>> {
        let registry = tokens::registry();
        let mut rows = Vec::new();

        let native = self.native_balance(chain_id, owner);
        let token_addrs = registry.tokens_for_chain(chain_id);
        let token_futs = token_addrs.iter().map(|token| {
            let token = *token;
            async move { (token, self.erc20_balance(chain_id, token, owner).await) }
        });

        let (native_result, token_results) = futures::join!(native, join_all(token_futs));

        match native_result {
            Ok(raw) if !raw.is_zero() => rows.push(TokenBalance {
                symbol: "ETH".to_string(),
                token: None,
                raw: raw.to_string(),
                formatted: super::format_units(raw, 18),
                decimals: 18,
                is_native: true,
            }),
            Ok(_) => {}
            Err(e) => tracing::warn!(chain_id, error = %e, "failed to fetch native balance"),
        }

        for (token, result) in token_results {
            let info: Option<&TokenInfo> = registry.get(&token);
            let (symbol, decimals) = match info {
                Some(info) => (info.symbol.to_string(), info.decimals),
                None => ("UNKNOWN".to_string(), 18),
            };
            match result {
                Ok(raw) if !raw.is_zero() => rows.push(TokenBalance {
                    symbol,
                    token: Some(token),
                    raw: raw.to_string(),
                    formatted: super::format_units(raw, decimals as u32),
                    decimals,
                    is_native: false,
                }),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(chain_id, token = %token, error = %e, "failed to fetch token balance")
                }
            }
        }

        Ok(rows)
    }

    /// Transfer native ETH
    pub async fn transfer_native(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        to: Address,
        amount: U256,
    ) -> Result<B256> {
        let tx = TransactionRequest::default().to(to).value(amount);
        self.submit(chain_id, wallet, tx).await
    }

    /// Transfer an ERC20 token with hand-encoded transfer calldata
    pub async fn transfer_erc20(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256> {
        let calldata = super::encode_call(
            TRANSFER,
            &[super::address_word(to), super::u256_word(amount)],
        );
        let tx = TransactionRequest::default()
            .to(token)
            .input(Bytes::from(calldata).into());
        self.submit(chain_id, wallet, tx).await
    }

    /// Sign and submit a transaction, waiting for it to land.
    ///
    /// Goes through the shared retry policy; only transient failures are
    /// retried, reverts come straight back.
    pub async fn submit(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        tx: TransactionRequest,
    ) -> Result<B256> {
        let url = self.rpc_url(chain_id)?;

        RetryPolicy::transaction_submission()
            .run("submit_transaction", || {
                let url = url.clone();
                let tx = tx.clone();
                let signer = wallet.wallet().clone();
                async move {
                    let provider = ProviderBuilder::new().wallet(signer).connect_http(url);
                    let pending = provider
                        .send_transaction(tx)
                        .await
                        .map_err(|e| Error::Chain(e.to_string()))?;
                    let hash = pending
                        .watch()
                        .await
                        .map_err(|e| Error::Chain(e.to_string()))?;
                    tracing::info!(chain_id, tx_hash = %hash, "transaction confirmed");
                    Ok(hash)
                }
            })
            .await
    }

    /// Raw eth_call for contract reads
    pub async fn call(&self, chain_id: u64, tx: TransactionRequest) -> Result<Bytes> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url(chain_id)?);
        provider
            .call(tx)
            .await
            .map_err(|e| Error::Chain(format!("eth_call failed: {}", e)))
    }
}
