//! Cross-chain bridge quote client
//!
//! Talks to a LI.FI-compatible quote endpoint: one GET returns both the
//! estimated receive amount and, when available, a ready-to-sign transaction
//! request for the source chain.

use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use serde::Deserialize;
use std::str::FromStr;

/// Default quote endpoint base
pub const DEFAULT_BRIDGE_API: &str = "https://li.quest/v1";

/// Parameters for a bridge quote
#[derive(Debug, Clone)]
pub struct BridgeQuoteRequest {
    pub from_chain: u64,
    pub to_chain: u64,
    pub from_token: Address,
    pub to_token: Address,
    pub amount: U256,
    pub from_address: Address,
}

/// A bridge route quote
#[derive(Debug, Clone)]
pub struct BridgeQuote {
    /// Estimated amount received on the destination chain, in base units
    pub to_amount: String,
    /// Estimated bridging time in seconds, when the API reports one
    pub execution_duration: Option<f64>,
    /// Source-chain transaction that executes the route
    pub transaction_request: Option<BridgeTxRequest>,
}

/// Wire transaction request as returned by the quote API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTxRequest {
    pub to: String,
    pub data: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl BridgeTxRequest {
    /// Convert to an alloy transaction request for submission
    pub fn to_transaction(&self) -> Result<TransactionRequest> {
        let to: Address = self
            .to
            .parse()
            .map_err(|e| Error::Bridge(format!("invalid 'to' address in route: {}", e)))?;

        let data_hex = self.data.strip_prefix("0x").unwrap_or(&self.data);
        let data = alloy::hex::decode(data_hex)
            .map_err(|e| Error::Bridge(format!("invalid calldata in route: {}", e)))?;

        let mut tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(data).into());

        if let Some(value) = &self.value {
            tx = tx.value(parse_u256(value)?);
        }
        if let Some(gas) = &self.gas_limit {
            let gas: u64 = parse_u256(gas)?
                .try_into()
                .map_err(|_| Error::Bridge(format!("gas limit out of range: {}", gas)))?;
            tx = tx.gas_limit(gas);
        }

        Ok(tx)
    }
}

// The API uses hex strings ("0x5208") and decimal strings interchangeably
fn parse_u256(raw: &str) -> Result<U256> {
    U256::from_str(raw).map_err(|e| Error::Bridge(format!("invalid numeric field '{}': {}", raw, e)))
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    estimate: QuoteEstimate,
    #[serde(rename = "transactionRequest")]
    transaction_request: Option<BridgeTxRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEstimate {
    to_amount: String,
    #[serde(default)]
    execution_duration: Option<f64>,
}

/// HTTP client for bridge route quotes
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BRIDGE_API)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch a route quote for moving tokens across chains
    pub async fn quote(&self, request: &BridgeQuoteRequest) -> Result<BridgeQuote> {
        let url = format!("{}/quote", self.base_url);
        tracing::debug!(
            from_chain = request.from_chain,
            to_chain = request.to_chain,
            amount = %request.amount,
            "requesting bridge quote"
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("fromChain", request.from_chain.to_string()),
                ("toChain", request.to_chain.to_string()),
                ("fromToken", request.from_token.to_string()),
                ("toToken", request.to_token.to_string()),
                ("fromAmount", request.amount.to_string()),
                ("fromAddress", request.from_address.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Bridge(format!(
                "quote request failed ({}): {}",
                status, body
            )));
        }

        let parsed: QuoteResponse = response.json().await?;
        Ok(BridgeQuote {
            to_amount: parsed.estimate.to_amount,
            execution_duration: parsed.estimate.execution_duration,
            transaction_request: parsed.transaction_request,
        })
    }
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new()
    }
}
