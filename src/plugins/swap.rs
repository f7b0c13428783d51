//! Swap plugin: DEX aggregation through Odos
//!
//! SECURITY NOTE:
//! - GET_SWAP_QUOTE is read-only and never touches the wallet
//! - SWAP_TOKENS signs through SecureWallet only after the aggregator
//!   returns a built transaction
//! - Stable-to-stable swaps run at tighter slippage than volatile pairs

use crate::chain::{classify_chain_error, format_units, to_base_units, EvmClient};
use crate::config::{Network, WalletConfig};
use crate::intent;
use crate::plugins::{Action, ActionContext, ActionResponse, Plugin};
use crate::tokens::{addresses, registry};
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use odos_sdk::{Chain, OdosClient, Slippage};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

/// Slippage tolerance in percent for stable-to-stable swaps
const STABLE_SLIPPAGE: f64 = 0.5;
/// Slippage tolerance in percent when either leg is volatile
const VOLATILE_SLIPPAGE: f64 = 1.0;

pub fn swap_plugin() -> Result<Plugin> {
    let client = Arc::new(
        OdosClient::new().map_err(|e| Error::Odos(format!("client construction failed: {e}")))?,
    );
    Ok(Plugin {
        name: "swap",
        description: "Token swaps routed through the Odos DEX aggregator",
        actions: vec![
            Box::new(SwapAction {
                client: Arc::clone(&client),
            }),
            Box::new(GetSwapQuoteAction { client }),
        ],
        providers: vec![],
    })
}

fn odos_chain(network: Network) -> Chain {
    match network {
        Network::Ethereum => Chain::ethereum(),
        Network::Arbitrum => Chain::arbitrum(),
        Network::Optimism => Chain::optimism(),
        Network::Base => Chain::base(),
    }
}

fn pick_slippage(from: &Address, to: &Address) -> f64 {
    if registry().is_stablecoin(from) && registry().is_stablecoin(to) {
        STABLE_SLIPPAGE
    } else {
        VOLATILE_SLIPPAGE
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct SwapInput {
    /// Amount of the input token in whole tokens
    amount: f64,
    /// Token symbol to sell
    input_token: String,
    /// Token symbol to buy
    output_token: String,
    /// Network name (defaults to ethereum)
    network: Option<String>,
}

struct SwapAction {
    client: Arc<OdosClient>,
}

#[async_trait]
impl Action for SwapAction {
    fn name(&self) -> &'static str {
        "SWAP_TOKENS"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["SWAP", "EXCHANGE_TOKENS", "TRADE_TOKENS"]
    }

    fn description(&self) -> &'static str {
        "Swap one token for another through the Odos aggregator"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "swap 100 USDC for WETH",
            "swap 0.5 WETH to USDT on arbitrum",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(SwapInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_symbol_pair(&ctx.message).is_some()
            && intent::extract_amount(&ctx.message).is_some()
            && WalletConfig::load(&ctx.settings).is_ok()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some((from_symbol, to_symbol)) = intent::extract_symbol_pair(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "Which tokens should I swap? Try something like 'swap 100 USDC for WETH'.",
            ));
        };
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I swap? Include an amount, e.g. 'swap 100 USDC for WETH'.",
            ));
        };
        let network = intent::extract_network(&ctx.message).unwrap_or(Network::Ethereum);
        let chain_id = network.chain_id();

        let Some((from_token, from_info)) = registry().resolve(chain_id, from_symbol) else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                from_symbol, network
            )));
        };
        let Some((to_token, to_info)) = registry().resolve(chain_id, to_symbol) else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                to_symbol, network
            )));
        };

        let config = WalletConfig::load(&ctx.settings)?;
        let signer = config.address();
        let amount_units = to_base_units(amount, from_info.decimals);
        let slippage = Slippage::percent(pick_slippage(&from_token, &to_token))
            .map_err(|e| Error::Odos(format!("invalid slippage: {e}")))?;
        let chain = odos_chain(network);

        let quote = match self
            .client
            .swap()
            .chain(chain)
            .from_token(from_token, amount_units)
            .to_token(to_token)
            .slippage(slippage)
            .signer(signer)
            .quote()
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                return Ok(ActionResponse::failure(format!("Swap quote failed: {}", e)));
            }
        };

        let tx = match self
            .client
            .swap()
            .chain(chain)
            .from_token(from_token, amount_units)
            .to_token(to_token)
            .slippage(slippage)
            .signer(signer)
            .build_transaction()
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(ActionResponse::failure(format!(
                    "Swap transaction build failed: {}",
                    e
                )));
            }
        };

        let expected_out = quote.out_amount().cloned().unwrap_or_else(|| "0".to_string());
        let expected_display = U256::from_str(&expected_out)
            .map(|raw| format_units(raw, u32::from(to_info.decimals)))
            .unwrap_or_else(|_| expected_out.clone());

        let evm = EvmClient::new(config.rpc.clone());
        match evm.submit(chain_id, &config.wallet, tx).await {
            Ok(tx_hash) => Ok(ActionResponse::ok_with_data(
                format!(
                    "Swapped {} {} for ~{} {} on {}. Transaction: {}",
                    amount, from_symbol, expected_display, to_symbol, network, tx_hash
                ),
                json!({
                    "tx_hash": tx_hash,
                    "input_token": from_symbol,
                    "output_token": to_symbol,
                    "input_amount": amount,
                    "expected_output": expected_out,
                    "price_impact_percent": quote.price_impact(),
                    "path_id": quote.path_id(),
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
struct SwapQuoteInput {
    /// Amount of the input token in whole tokens
    amount: f64,
    /// Token symbol to sell
    input_token: String,
    /// Token symbol to buy
    output_token: String,
    /// Network name (defaults to ethereum)
    network: Option<String>,
}

struct GetSwapQuoteAction {
    client: Arc<OdosClient>,
}

#[async_trait]
impl Action for GetSwapQuoteAction {
    fn name(&self) -> &'static str {
        "GET_SWAP_QUOTE"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["SWAP_QUOTE", "QUOTE", "PRICE_CHECK"]
    }

    fn description(&self) -> &'static str {
        "Get a swap quote from Odos without executing anything"
    }

    fn examples(&self) -> &'static [&'static str] {
        &["quote 1000 USDC to WETH", "how much WETH for 500 DAI on base"]
    }

    fn input_schema(&self) -> Value {
        schema_for!(SwapQuoteInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_symbol_pair(&ctx.message).is_some()
            && intent::extract_amount(&ctx.message).is_some()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some((from_symbol, to_symbol)) = intent::extract_symbol_pair(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "Which tokens should I quote? Try 'quote 1000 USDC to WETH'.",
            ));
        };
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I quote? Include an amount, e.g. 'quote 1000 USDC to WETH'.",
            ));
        };
        let network = intent::extract_network(&ctx.message).unwrap_or(Network::Ethereum);
        let chain_id = network.chain_id();

        let Some((from_token, from_info)) = registry().resolve(chain_id, from_symbol) else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                from_symbol, network
            )));
        };
        let Some((to_token, to_info)) = registry().resolve(chain_id, to_symbol) else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                to_symbol, network
            )));
        };

        // Quotes work without a configured wallet; the zero address is a fine signer
        let signer = WalletConfig::load(&ctx.settings)
            .map(|c| c.address())
            .unwrap_or(addresses::ZERO_ADDRESS);
        let amount_units = to_base_units(amount, from_info.decimals);
        let slippage = Slippage::percent(pick_slippage(&from_token, &to_token))
            .map_err(|e| Error::Odos(format!("invalid slippage: {e}")))?;

        let quote = match self
            .client
            .swap()
            .chain(odos_chain(network))
            .from_token(from_token, amount_units)
            .to_token(to_token)
            .slippage(slippage)
            .signer(signer)
            .quote()
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                return Ok(ActionResponse::failure(format!("Swap quote failed: {}", e)));
            }
        };

        let expected_out = quote.out_amount().cloned().unwrap_or_else(|| "0".to_string());
        let expected_display = U256::from_str(&expected_out)
            .map(|raw| format_units(raw, u32::from(to_info.decimals)))
            .unwrap_or_else(|_| expected_out.clone());

        Ok(ActionResponse::ok_with_data(
            format!(
                "{} {} gets you ~{} {} on {}",
                amount, from_symbol, expected_display, to_symbol, network
            ),
            json!({
                "input_token": from_symbol,
                "output_token": to_symbol,
                "input_amount": amount,
                "expected_output": expected_out,
                "price_impact_percent": quote.price_impact(),
                "gas_estimate": quote.gas_estimate(),
                "path_id": quote.path_id(),
                "chain_id": chain_id,
            }),
        ))
    }
}
