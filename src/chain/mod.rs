//! Chain-facing clients and shared on-chain helpers
//!
//! Everything that touches RPC endpoints lives under this module: the EVM
//! client (balances, transfers, submission), the lending-pool client, and
//! the bridge quote client. The unit-conversion and calldata helpers plus
//! the error classifier are shared by all of them.

mod bridge;
mod evm;
mod lending;

pub use bridge::{BridgeClient, BridgeQuote, BridgeQuoteRequest, BridgeTxRequest};
pub use evm::{EvmClient, TokenBalance};
pub use lending::{AccountData, LendingClient};

use alloy::primitives::{Address, U256};

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        // Format with decimal places
        let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = remainder_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

/// Convert a human-readable amount to base units.
///
/// Goes through f64, which is fine for user-entered amounts but not for
/// arithmetic on chain values; those stay in U256.
pub fn to_base_units(amount: f64, decimals: u8) -> U256 {
    if amount <= 0.0 {
        return U256::ZERO;
    }
    let scaled = amount * 10f64.powi(decimals as i32);
    U256::from(scaled as u128)
}

/// One 32-byte ABI word from an address (left-padded)
pub(crate) fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// One 32-byte ABI word from a U256
pub(crate) fn u256_word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// Build calldata: 4-byte selector followed by 32-byte words
pub(crate) fn encode_call(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + words.len() * 32);
    data.extend_from_slice(&selector);
    for word in words {
        data.extend_from_slice(word);
    }
    data
}

/// Substring patterns mapped to user-facing failure messages.
///
/// Ordered: the first class whose pattern appears in the raw error wins.
const ERROR_CLASSES: [(&[&str], &str); 6] = [
    (
        &["insufficient funds", "insufficient balance", "exceeds balance"],
        "Insufficient funds: the wallet cannot cover this amount plus gas.",
    ),
    (
        &["slippage", "insufficient output amount", "min return", "minimum amount"],
        "Price moved beyond the slippage tolerance. Try a smaller amount or a higher tolerance.",
    ),
    (
        &["timeout", "timed out", "deadline"],
        "The network timed out before the transaction confirmed. It may succeed on retry.",
    ),
    (
        &["blockhash", "block hash"],
        "The transaction referenced stale chain state. Re-submit to use fresh state.",
    ),
    (
        &["insufficient collateral", "health factor", "collateral cannot cover"],
        "Insufficient collateral: the position cannot support this operation.",
    ),
    (
        &["supply cap", "borrow cap", "reserve paused", "reserve frozen", "reserve inactive"],
        "The lending reserve cannot accept this operation right now.",
    ),
];

/// Map a raw RPC/SDK error string to a message fit for a chat response.
///
/// Unrecognized errors pass through with revert framing stripped.
pub fn classify_chain_error(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    for (patterns, message) in ERROR_CLASSES {
        if patterns.iter().any(|p| lowered.contains(p)) {
            return message.to_string();
        }
    }

    // Unknown revert: surface the reason text if the node included one
    if let Some(start) = raw.find("revert: ") {
        let reason = &raw[start + 8..];
        let reason = reason.split('"').next().unwrap_or(reason);
        return format!("Transaction reverted: {}", reason.trim());
    }

    format!("Transaction failed: {}", raw)
}

/// Patterns that indicate a transient failure worth retrying
const TRANSIENT_PATTERNS: [&str; 9] = [
    "timeout",
    "timed out",
    "blockhash",
    "block hash",
    "connection",
    "reset by peer",
    "rate limit",
    "too many requests",
    "temporarily unavailable",
];

/// Whether a raw error string looks transient (network/state races).
pub fn is_transient(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lowered.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        // 1 ETH = 1e18 wei
        let one_eth = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(format_units(one_eth, 18), "1");

        // 1.5 ETH
        let one_point_five = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_units(one_point_five, 18), "1.5");

        // 1000 USDC (6 decimals)
        let thousand_usdc = U256::from(1_000_000_000u64);
        assert_eq!(format_units(thousand_usdc, 6), "1000");

        // 0
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(100.0, 6), U256::from(100_000_000u64));
        assert_eq!(to_base_units(0.5, 18), U256::from(500_000_000_000_000_000u128));
        assert_eq!(to_base_units(0.0, 6), U256::ZERO);
        assert_eq!(to_base_units(-5.0, 6), U256::ZERO);
    }

    #[test]
    fn test_round_trip_units() {
        let raw = to_base_units(1234.56, 6);
        assert_eq!(format_units(raw, 6), "1234.56");
    }

    #[test]
    fn test_encode_call_layout() {
        let addr = Address::from([0x11u8; 20]);
        let data = encode_call(
            [0x70, 0xa0, 0x82, 0x31],
            &[address_word(addr), u256_word(U256::from(7u64))],
        );

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        // Address left-padded to 32 bytes
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], addr.as_slice());
        // U256 big-endian in the second word
        assert_eq!(data[67], 7);
    }

    #[test]
    fn test_classify_known_failures() {
        assert!(
            classify_chain_error("execution reverted: ERC20: transfer amount exceeds balance")
                .contains("Insufficient funds")
        );
        assert!(classify_chain_error("Too little received: slippage").contains("slippage"));
        assert!(classify_chain_error("request timed out after 30s").contains("timed out"));
        assert!(classify_chain_error("stale blockhash").contains("stale chain state"));
        assert!(
            classify_chain_error("health factor below liquidation threshold")
                .contains("Insufficient collateral")
        );
        assert!(classify_chain_error("51: supply cap reached").contains("lending reserve"));
    }

    #[test]
    fn test_classify_extracts_revert_reason() {
        let msg = classify_chain_error("execution reverted: revert: Pool is closed\" code=3");
        assert_eq!(msg, "Transaction reverted: Pool is closed");
    }

    #[test]
    fn test_classify_passthrough() {
        let msg = classify_chain_error("something novel happened");
        assert!(msg.contains("something novel happened"));
    }

    #[test]
    fn test_is_transient() {
        assert!(is_transient("connection reset by peer"));
        assert!(is_transient("429 Too Many Requests"));
        assert!(is_transient("stale blockhash"));
        assert!(!is_transient("execution reverted: insufficient collateral"));
    }
}
