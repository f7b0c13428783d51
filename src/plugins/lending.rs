//! Lending plugin: supply, borrow, repay, withdraw against the pool
//!
//! SECURITY NOTE:
//! - Calldata is hand-encoded locally; nothing from the network is executed
//! - Borrows always take the variable rate; the rate mode is not
//!   user-controllable through the message
//! - ETH is silently mapped to WETH because the pool only takes wrapped ether

use crate::chain::{classify_chain_error, to_base_units, EvmClient, LendingClient};
use crate::config::{Network, WalletConfig};
use crate::intent;
use crate::plugins::{Action, ActionContext, ActionResponse, Plugin, Provider};
use crate::tokens::registry;
use crate::Result;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn lending_plugin() -> Plugin {
    Plugin {
        name: "lending",
        description: "Lending pool operations: supply collateral, borrow, repay, withdraw",
        actions: vec![
            Box::new(SupplyAction),
            Box::new(BorrowAction),
            Box::new(RepayAction),
            Box::new(WithdrawAction),
        ],
        providers: vec![Box::new(PositionProvider)],
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct LendingInput {
    /// Amount in whole tokens
    amount: f64,
    /// Token symbol (ETH is treated as WETH)
    token: String,
    /// Network name (defaults to ethereum)
    network: Option<String>,
}

#[derive(Clone, Copy)]
enum PoolOp {
    Supply,
    Borrow,
    Repay,
    Withdraw,
}

impl PoolOp {
    fn verb(self) -> &'static str {
        match self {
            PoolOp::Supply => "supply",
            PoolOp::Borrow => "borrow",
            PoolOp::Repay => "repay",
            PoolOp::Withdraw => "withdraw",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            PoolOp::Supply => "Supplied",
            PoolOp::Borrow => "Borrowed",
            PoolOp::Repay => "Repaid",
            PoolOp::Withdraw => "Withdrew",
        }
    }
}

struct ParsedIntent {
    amount: f64,
    symbol: &'static str,
    network: Network,
}

fn parse_pool_intent(message: &str, op: PoolOp) -> std::result::Result<ParsedIntent, ActionResponse> {
    let Some(amount) = intent::extract_amount(message) else {
        return Err(ActionResponse::failure(format!(
            "How much should I {}? Include an amount, e.g. '{} 1000 USDC'.",
            op.verb(),
            op.verb()
        )));
    };
    let Some(symbol) = intent::extract_symbol(message) else {
        return Err(ActionResponse::failure(format!(
            "Which token should I {}? Name one, e.g. '{} 1000 USDC'.",
            op.verb(),
            op.verb()
        )));
    };
    let network = intent::extract_network(message).unwrap_or(Network::Ethereum);
    // The pool has no native-ETH market
    let symbol = if symbol == "ETH" { "WETH" } else { symbol };
    Ok(ParsedIntent {
        amount,
        symbol,
        network,
    })
}

async fn run_pool_op(op: PoolOp, ctx: &ActionContext) -> Result<ActionResponse> {
    let parsed = match parse_pool_intent(&ctx.message, op) {
        Ok(parsed) => parsed,
        Err(clarification) => return Ok(clarification),
    };
    let chain_id = parsed.network.chain_id();

    if LendingClient::pool_address(chain_id).is_none() {
        return Ok(ActionResponse::failure(format!(
            "No lending pool is deployed on {}",
            parsed.network
        )));
    }
    let Some((asset, info)) = registry().resolve(chain_id, parsed.symbol) else {
        return Ok(ActionResponse::failure(format!(
            "{} is not available on {}",
            parsed.symbol, parsed.network
        )));
    };

    let config = WalletConfig::load(&ctx.settings)?;
    let client = LendingClient::new(EvmClient::new(config.rpc.clone()));
    let amount_units = to_base_units(parsed.amount, info.decimals);

    let result = match op {
        PoolOp::Supply => {
            client
                .supply(chain_id, &config.wallet, asset, amount_units)
                .await
        }
        PoolOp::Borrow => {
            client
                .borrow(chain_id, &config.wallet, asset, amount_units)
                .await
        }
        PoolOp::Repay => {
            client
                .repay(chain_id, &config.wallet, asset, amount_units)
                .await
        }
        PoolOp::Withdraw => {
            client
                .withdraw(chain_id, &config.wallet, asset, amount_units)
                .await
        }
    };

    match result {
        Ok(tx_hash) => Ok(ActionResponse::ok_with_data(
            format!(
                "{} {} {} on {}. Transaction: {}",
                op.past_tense(),
                parsed.amount,
                parsed.symbol,
                parsed.network,
                tx_hash
            ),
            json!({
                "tx_hash": tx_hash,
                "operation": op.verb(),
                "token": parsed.symbol,
                "amount": parsed.amount,
                "chain_id": chain_id,
            }),
        )),
        Err(e) => Ok(ActionResponse::failure(classify_chain_error(
            &e.to_string(),
        ))),
    }
}

async fn validate_pool_op(op: PoolOp, ctx: &ActionContext) -> bool {
    parse_pool_intent(&ctx.message, op).is_ok() && WalletConfig::load(&ctx.settings).is_ok()
}

struct SupplyAction;

#[async_trait]
impl Action for SupplyAction {
    fn name(&self) -> &'static str {
        "SUPPLY_COLLATERAL"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["SUPPLY", "DEPOSIT_COLLATERAL", "LEND"]
    }

    fn description(&self) -> &'static str {
        "Supply a token to the lending pool as collateral"
    }

    fn examples(&self) -> &'static [&'static str] {
        &["supply 1000 USDC", "deposit 0.5 WETH as collateral on base"]
    }

    fn input_schema(&self) -> Value {
        schema_for!(LendingInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        validate_pool_op(PoolOp::Supply, ctx).await
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        run_pool_op(PoolOp::Supply, ctx).await
    }
}

struct BorrowAction;

#[async_trait]
impl Action for BorrowAction {
    fn name(&self) -> &'static str {
        "BORROW_TOKENS"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["BORROW", "TAKE_LOAN"]
    }

    fn description(&self) -> &'static str {
        "Borrow a token against supplied collateral at the variable rate"
    }

    fn examples(&self) -> &'static [&'static str] {
        &["borrow 500 USDC", "borrow 200 DAI on arbitrum"]
    }

    fn input_schema(&self) -> Value {
        schema_for!(LendingInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        validate_pool_op(PoolOp::Borrow, ctx).await
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        run_pool_op(PoolOp::Borrow, ctx).await
    }
}

struct RepayAction;

#[async_trait]
impl Action for RepayAction {
    fn name(&self) -> &'static str {
        "REPAY_LOAN"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["REPAY", "PAY_BACK"]
    }

    fn description(&self) -> &'static str {
        "Repay variable-rate debt on the lending pool"
    }

    fn examples(&self) -> &'static [&'static str] {
        &["repay 500 USDC", "pay back 200 DAI on optimism"]
    }

    fn input_schema(&self) -> Value {
        schema_for!(LendingInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        validate_pool_op(PoolOp::Repay, ctx).await
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        run_pool_op(PoolOp::Repay, ctx).await
    }
}

struct WithdrawAction;

#[async_trait]
impl Action for WithdrawAction {
    fn name(&self) -> &'static str {
        "WITHDRAW_COLLATERAL"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["WITHDRAW", "REDEEM"]
    }

    fn description(&self) -> &'static str {
        "Withdraw supplied collateral from the lending pool"
    }

    fn examples(&self) -> &'static [&'static str] {
        &["withdraw 1000 USDC", "withdraw 0.5 WETH on base"]
    }

    fn input_schema(&self) -> Value {
        schema_for!(LendingInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        validate_pool_op(PoolOp::Withdraw, ctx).await
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        run_pool_op(PoolOp::Withdraw, ctx).await
    }
}

/// Surfaces the wallet's pool position on each chain that has a pool
struct PositionProvider;

#[async_trait]
impl Provider for PositionProvider {
    fn name(&self) -> &'static str {
        "LENDING_POSITION"
    }

    fn description(&self) -> &'static str {
        "Collateral, debt, and health factor for the agent wallet on each lending market"
    }

    async fn get(&self, ctx: &ActionContext) -> Result<String> {
        let config = WalletConfig::load(&ctx.settings)?;
        let client = LendingClient::new(EvmClient::new(config.rpc.clone()));
        let owner = config.address();

        let mut lines = vec![format!("Lending position for {}", owner)];
        for network in Network::ALL {
            if LendingClient::pool_address(network.chain_id()).is_none() {
                continue;
            }
            match client.account_data(network.chain_id(), owner).await {
                Ok(data) => {
                    let health = if data.health_factor_f64().is_infinite() {
                        "no debt".to_string()
                    } else {
                        format!("health {:.3}", data.health_factor_f64())
                    };
                    lines.push(format!(
                        "  {}: collateral ${:.2}, debt ${:.2}, {}",
                        network,
                        data.total_collateral_usd(),
                        data.total_debt_usd(),
                        health
                    ));
                }
                Err(e) => {
                    tracing::warn!(network = %network, error = %e, "account data fetch failed");
                    lines.push(format!("  {}: unavailable", network));
                }
            }
        }
        Ok(lines.join("\n"))
    }
}
