//! Intent extraction from free-text messages
//!
//! Action handlers receive natural-language text ("swap 100 usdc for weth on
//! arbitrum") and pull out the structured pieces with small, cached regexes:
//! the first decimal amount, a 0x address, known token symbols, and chain
//! names. Destination chains ("to arbi") additionally get a prefix fallback
//! so partial names resolve.
//!
//! Every extractor returns Option; a miss means the action asks the user for
//! clarification instead of guessing.

use crate::config::Network;
use crate::tokens;
use alloy::primitives::Address;
use regex::Regex;
use std::sync::OnceLock;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+(?:\.\d+)?)\b").expect("amount pattern compiles"))
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b0x[0-9a-fA-F]{40}\b").expect("address pattern compiles"))
}

fn symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = tokens::SYMBOLS.join("|");
        Regex::new(&format!(r"(?i)\b({})\b", alternation)).expect("symbol pattern compiles")
    })
}

fn network_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(ethereum|mainnet|arbitrum|optimism|base)\b")
            .expect("network pattern compiles")
    })
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bto\s+([a-zA-Z]+)").expect("destination pattern compiles"))
}

fn source_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bfrom\s+([a-zA-Z]+)").expect("source pattern compiles"))
}

/// First decimal number in the text.
///
/// Hex strings never match: the word boundaries reject digit runs embedded
/// in addresses and hashes.
pub fn extract_amount(text: &str) -> Option<f64> {
    amount_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// First 40-hex-digit 0x address in the text
pub fn extract_address(text: &str) -> Option<Address> {
    address_re()
        .find(text)
        .and_then(|m| m.as_str().parse::<Address>().ok())
}

/// First known token symbol, canonicalized to uppercase
pub fn extract_symbol(text: &str) -> Option<&'static str> {
    symbol_re()
        .find(text)
        .and_then(|m| canonical_symbol(m.as_str()))
}

/// First two distinct token symbols in text order, for swap pairs
pub fn extract_symbol_pair(text: &str) -> Option<(&'static str, &'static str)> {
    let mut seen: Vec<&'static str> = Vec::new();
    for m in symbol_re().find_iter(text) {
        if let Some(symbol) = canonical_symbol(m.as_str()) {
            if !seen.contains(&symbol) {
                seen.push(symbol);
            }
            if seen.len() == 2 {
                return Some((seen[0], seen[1]));
            }
        }
    }
    None
}

/// First chain name mentioned anywhere in the text
pub fn extract_network(text: &str) -> Option<Network> {
    network_re()
        .find(text)
        .and_then(|m| Network::from_name(m.as_str()))
}

/// Chain named after "to", with a prefix fallback for partial names
/// ("bridge 100 usdc to arbi" resolves to Arbitrum).
pub fn extract_destination(text: &str) -> Option<Network> {
    let word = destination_re().captures(text)?.get(1)?.as_str();
    resolve_network_word(word)
}

/// Chain named after "from"
pub fn extract_source(text: &str) -> Option<Network> {
    let word = source_re().captures(text)?.get(1)?.as_str();
    resolve_network_word(word)
}

fn resolve_network_word(word: &str) -> Option<Network> {
    if let Some(network) = Network::from_name(word) {
        return Some(network);
    }
    // Prefix fallback; three characters minimum so short words like "to a
    // friend" never resolve to a chain
    let lowered = word.to_ascii_lowercase();
    if lowered.len() < 3 {
        return None;
    }
    Network::ALL
        .into_iter()
        .find(|n| n.name().starts_with(&lowered))
}

fn canonical_symbol(raw: &str) -> Option<&'static str> {
    tokens::SYMBOLS
        .iter()
        .find(|s| s.eq_ignore_ascii_case(raw))
        .copied()
}
