//! DeFi Agent Plugin Kit
//!
//! A plugin layer for chat-driven blockchain agents:
//! - Parse user intent (amounts, tokens, addresses, chains) from free text
//! - Execute wallet, swap, bridge, and lending operations via chain seams
//! - Coordinate multi-agent work through a persistence-backed mailbox
//! - Drive multi-step vault workflows behind a health-factor risk gate
//!
//! # Security Model
//!
//! - Private keys never leave the wallet module and never hit logs
//! - Every action boundary returns a response value; nothing panics the host
//! - Risk checks run before any irreversible on-chain step

pub mod chain;
pub mod config;
pub mod coordination;
pub mod intent;
pub mod plugins;
pub mod retry;
pub mod tokens;
pub mod wallet;
pub mod workflow;

mod error;

// Re-export commonly used types
pub use config::{Network, Settings, WalletConfig, WorkflowLimits};
pub use coordination::{CoordinationError, TaskCoordinator};
pub use error::{Error, Result};
pub use plugins::{default_kit, Action, ActionContext, ActionResponse, Plugin, Provider};
