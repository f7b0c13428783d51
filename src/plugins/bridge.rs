//! Bridge plugin: cross-chain transfers through a LI.FI-style quote API
//!
//! SECURITY NOTE:
//! - The quote API only returns calldata; signing happens locally through
//!   SecureWallet
//! - The destination address is always the configured wallet, never an
//!   address taken from the quote response

use crate::chain::{classify_chain_error, format_units, to_base_units, BridgeClient,
    BridgeQuoteRequest, EvmClient};
use crate::config::{Network, WalletConfig};
use crate::intent;
use crate::plugins::{Action, ActionContext, ActionResponse, Plugin};
use crate::tokens::registry;
use crate::Result;
use alloy::primitives::U256;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

pub fn bridge_plugin() -> Plugin {
    Plugin {
        name: "bridge",
        description: "Cross-chain token transfers via bridge aggregation",
        actions: vec![Box::new(BridgeAction {
            client: BridgeClient::new(),
        })],
        providers: vec![],
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct BridgeInput {
    /// Amount in whole tokens
    amount: f64,
    /// Token symbol to bridge
    token: String,
    /// Source network (defaults to ethereum)
    from_network: Option<String>,
    /// Destination network
    to_network: String,
}

struct BridgeAction {
    client: BridgeClient,
}

#[async_trait]
impl Action for BridgeAction {
    fn name(&self) -> &'static str {
        "BRIDGE_TOKENS"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["BRIDGE", "MOVE_TOKENS", "CROSS_CHAIN_TRANSFER"]
    }

    fn description(&self) -> &'static str {
        "Bridge a token from one supported chain to another"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "bridge 100 USDC from ethereum to arbitrum",
            "move 0.5 WETH to base",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(BridgeInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_amount(&ctx.message).is_some()
            && intent::extract_symbol(&ctx.message).is_some()
            && intent::extract_destination(&ctx.message).is_some()
            && WalletConfig::load(&ctx.settings).is_ok()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I bridge? Include an amount, e.g. 'bridge 100 USDC to arbitrum'.",
            ));
        };
        let Some(symbol) = intent::extract_symbol(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "Which token should I bridge? Name one, e.g. 'bridge 100 USDC to arbitrum'.",
            ));
        };
        let Some(to_network) = intent::extract_destination(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "Where should the funds end up? Name a destination chain, e.g. 'to arbitrum'.",
            ));
        };
        let from_network = intent::extract_source(&ctx.message).unwrap_or(Network::Ethereum);

        if from_network == to_network {
            return Ok(ActionResponse::failure(format!(
                "Source and destination are both {}; nothing to bridge.",
                to_network
            )));
        }

        let Some((from_token, from_info)) = registry().resolve(from_network.chain_id(), symbol)
        else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                symbol, from_network
            )));
        };
        let Some((to_token, to_info)) = registry().resolve(to_network.chain_id(), symbol) else {
            return Ok(ActionResponse::failure(format!(
                "{} is not available on {}",
                symbol, to_network
            )));
        };

        let config = WalletConfig::load(&ctx.settings)?;
        let request = BridgeQuoteRequest {
            from_chain: from_network.chain_id(),
            to_chain: to_network.chain_id(),
            from_token,
            to_token,
            amount: to_base_units(amount, from_info.decimals),
            from_address: config.address(),
        };

        let quote = match self.client.quote(&request).await {
            Ok(quote) => quote,
            Err(e) => {
                return Ok(ActionResponse::failure(format!(
                    "Bridge quote failed: {}",
                    e
                )));
            }
        };

        let receive_display = U256::from_str(&quote.to_amount)
            .map(|raw| format_units(raw, u32::from(to_info.decimals)))
            .unwrap_or_else(|_| quote.to_amount.clone());
        let duration = quote
            .execution_duration
            .map(|secs| format!(" (~{:.0}s)", secs))
            .unwrap_or_default();

        let Some(tx_request) = quote.transaction_request.as_ref() else {
            return Ok(ActionResponse::failure(
                "The bridge returned no executable transaction for this route.",
            ));
        };
        let tx = match tx_request.to_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                return Ok(ActionResponse::failure(format!(
                    "Bridge returned a malformed transaction: {}",
                    e
                )));
            }
        };

        let evm = EvmClient::new(config.rpc.clone());
        match evm
            .submit(from_network.chain_id(), &config.wallet, tx)
            .await
        {
            Ok(tx_hash) => Ok(ActionResponse::ok_with_data(
                format!(
                    "Bridging {} {} from {} to {}; you'll receive ~{} {}{}. Transaction: {}",
                    amount,
                    symbol,
                    from_network,
                    to_network,
                    receive_display,
                    symbol,
                    duration,
                    tx_hash
                ),
                json!({
                    "tx_hash": tx_hash,
                    "token": symbol,
                    "amount": amount,
                    "from_chain": from_network.chain_id(),
                    "to_chain": to_network.chain_id(),
                    "expected_receive": quote.to_amount,
                    "execution_duration_seconds": quote.execution_duration,
                }),
            )),
            Err(e) => Ok(ActionResponse::failure(classify_chain_error(
                &e.to_string(),
            ))),
        }
    }
}
