//! Secure wallet management
//!
//! This module handles private key storage and transaction signing.
//! The private key NEVER leaves this module and is NEVER exposed to the host
//! runtime or serialized into coordination state.

mod signer;

pub use signer::SecureWallet;
