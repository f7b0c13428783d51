//! Wallet plugin: transfers and balance queries
//!
//! SECURITY NOTE:
//! - The private key never leaves the SecureWallet wrapper
//! - Handlers load credentials per invocation through the settings seam
//! - Balance queries run unauthenticated; only transfers sign

use crate::chain::{classify_chain_error, format_units, to_base_units, EvmClient};
use crate::config::{Network, WalletConfig};
use crate::intent;
use crate::plugins::{Action, ActionContext, ActionResponse, Plugin, Provider};
use crate::tokens::registry;
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn wallet_plugin() -> Plugin {
    Plugin {
        name: "wallet",
        description: "Native and ERC-20 transfers plus balance queries across \
                      Ethereum, Arbitrum, Optimism, and Base",
        actions: vec![Box::new(TransferAction), Box::new(CheckBalanceAction)],
        providers: vec![Box::new(WalletProvider)],
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct TransferInput {
    /// Amount in whole tokens
    amount: f64,
    /// Token symbol; the chain's native ETH when omitted
    token: Option<String>,
    /// Recipient address
    to: String,
    /// Network name (defaults to ethereum)
    network: Option<String>,
}

struct TransferAction;

#[async_trait]
impl Action for TransferAction {
    fn name(&self) -> &'static str {
        "TRANSFER"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["SEND_TOKENS", "SEND", "PAY"]
    }

    fn description(&self) -> &'static str {
        "Transfer native ETH or an ERC-20 token to another address"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "send 0.5 ETH to 0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
            "transfer 100 USDC to 0x742d35Cc6634C0532925a3b844Bc454e4438f44e on arbitrum",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(TransferInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_amount(&ctx.message).is_some()
            && intent::extract_address(&ctx.message).is_some()
            && WalletConfig::load(&ctx.settings).is_ok()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I transfer? Include an amount, e.g. 'send 0.5 ETH to 0x...'.",
            ));
        };
        let Some(to) = intent::extract_address(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "Which address should receive the funds? Include the full 0x recipient address.",
            ));
        };
        let network = intent::extract_network(&ctx.message).unwrap_or(Network::Ethereum);
        let symbol = intent::extract_symbol(&ctx.message).unwrap_or("ETH");

        let config = WalletConfig::load(&ctx.settings)?;
        let evm = EvmClient::new(config.rpc.clone());
        let chain_id = network.chain_id();

        let result = if symbol == "ETH" {
            evm.transfer_native(chain_id, &config.wallet, to, to_base_units(amount, 18))
                .await
        } else {
            let Some((token, info)) = registry().resolve(chain_id, symbol) else {
                return Ok(ActionResponse::failure(format!(
                    "{} is not available on {}",
                    symbol, network
                )));
            };
            evm.transfer_erc20(
                chain_id,
                &config.wallet,
                token,
                to,
                to_base_units(amount, info.decimals),
            )
            .await
        };

        match result {
            Ok(tx_hash) => Ok(ActionResponse::ok_with_data(
                format!(
                    "Transferred {} {} to {} on {}. Transaction: {}",
                    amount, symbol, to, network, tx_hash
                ),
                json!({
                    "tx_hash": tx_hash,
                    "amount": amount,
                    "token": symbol,
                    "to": to,
                    "chain_id": chain_id,
                }),
            )),
            Err(e) => Ok(ActionResponse::failure(classify_chain_error(
                &e.to_string(),
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct BalanceInput {
    /// Address to inspect; the configured wallet when omitted
    address: Option<String>,
    /// Network name (defaults to ethereum)
    network: Option<String>,
}

struct CheckBalanceAction;

#[async_trait]
impl Action for CheckBalanceAction {
    fn name(&self) -> &'static str {
        "CHECK_BALANCE"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["GET_BALANCE", "BALANCE", "SHOW_HOLDINGS"]
    }

    fn description(&self) -> &'static str {
        "Check native and ERC-20 token balances for an address"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "what's my balance on base",
            "check 0x742d35Cc6634C0532925a3b844Bc454e4438f44e on arbitrum",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(BalanceInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_address(&ctx.message).is_some()
            || WalletConfig::load(&ctx.settings).is_ok()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let network = intent::extract_network(&ctx.message).unwrap_or(Network::Ethereum);
        let owner = match intent::extract_address(&ctx.message) {
            Some(address) => address,
            None => WalletConfig::load(&ctx.settings)?.address(),
        };

        let evm = EvmClient::from_env();
        match evm.balances(network.chain_id(), owner).await {
            Ok(rows) if rows.is_empty() => Ok(ActionResponse::ok(format!(
                "{} holds no tracked tokens on {}",
                owner, network
            ))),
            Ok(rows) => {
                let lines: Vec<String> = rows
                    .iter()
                    .map(|b| format!("  {} {}", b.formatted, b.symbol))
                    .collect();
                Ok(ActionResponse::ok_with_data(
                    format!(
                        "Balances for {} on {}:\n{}",
                        owner,
                        network,
                        lines.join("\n")
                    ),
                    json!({
                        "address": owner,
                        "chain_id": network.chain_id(),
                        "balances": rows,
                    }),
                ))
            }
            Err(e) => Ok(ActionResponse::failure(classify_chain_error(
                &e.to_string(),
            ))),
        }
    }
}

/// Supplies the agent wallet address and per-chain native balances as context
struct WalletProvider;

#[async_trait]
impl Provider for WalletProvider {
    fn name(&self) -> &'static str {
        "WALLET"
    }

    fn description(&self) -> &'static str {
        "The agent wallet address and its native balance on each supported chain"
    }

    async fn get(&self, ctx: &ActionContext) -> Result<String> {
        let config = WalletConfig::load(&ctx.settings)?;
        let evm = EvmClient::new(config.rpc.clone());
        let address = config.address();

        let fetches = Network::ALL.map(|network| {
            let evm = evm.clone();
            async move {
                (
                    network,
                    evm.native_balance(network.chain_id(), address).await,
                )
            }
        });

        let mut lines = vec![format!("Wallet: {}", address)];
        for (network, result) in join_all(fetches).await {
            match result {
                Ok(balance) => {
                    lines.push(format!("  {}: {} ETH", network, format_units(balance, 18)))
                }
                Err(e) => {
                    tracing::warn!(network = %network, error = %e, "native balance fetch failed");
                    lines.push(format!("  {}: unavailable", network));
                }
            }
        }
        Ok(lines.join("\n"))
    }
}
