//! Error types for the plugin kit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Odos API error: {0}")]
    Odos(String),

    #[error("Bridge API error: {0}")]
    Bridge(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Risk check blocked: {0}")]
    Blocked(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Coordination error: {0}")]
    Coordination(#[from] crate::coordination::CoordinationError),
}

pub type Result<T> = std::result::Result<T, Error>;
