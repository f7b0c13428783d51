//! Agent-facing plugin surface
//!
//! Each plugin bundles related actions (invocable operations) and providers
//! (read-only context suppliers) under a name the host runtime discovers.
//! Handlers pull structured parameters out of the raw user message with the
//! intent parser, validate credentials through the settings seam, call the
//! chain clients, and normalize every outcome into an [`ActionResponse`];
//! nothing an action does is fatal to the host.
//!
//! Registries are plain values assembled by [`default_kit`] at startup and
//! handed to the host; there is no global plugin table to mutate.

mod bridge;
mod lending;
mod swap;
mod vault;
mod wallet;

pub use bridge::bridge_plugin;
pub use lending::lending_plugin;
pub use swap::swap_plugin;
pub use vault::vault_plugin;
pub use wallet::wallet_plugin;

use crate::config::Settings;
use crate::coordination::TaskCoordinator;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// What an action or provider sees for one invocation
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub user_id: String,
    /// Raw user message the intent parser works on
    pub message: String,
    pub settings: Settings,
}

impl ActionContext {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            settings: Settings::from_env(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
}

/// Uniform action result handed back to the host
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub text: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            data: None,
        }
    }

    pub fn ok_with_data(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            success: true,
            data: Some(data),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
            data: None,
        }
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Alternate names the host may route by
    fn similes(&self) -> &'static [&'static str] {
        &[]
    }

    fn description(&self) -> &'static str;

    /// Sample user messages this action handles
    fn examples(&self) -> &'static [&'static str] {
        &[]
    }

    /// JSON schema of the parameters the handler extracts from the message
    fn input_schema(&self) -> Value;

    /// Cheap pre-check: does this action stand a chance for the context?
    async fn validate(&self, ctx: &ActionContext) -> bool;

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse>;
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn get(&self, ctx: &ActionContext) -> Result<String>;
}

/// A named bundle of actions and providers the host runtime discovers
pub struct Plugin {
    pub name: &'static str,
    pub description: &'static str,
    pub actions: Vec<Box<dyn Action>>,
    pub providers: Vec<Box<dyn Provider>>,
}

impl Plugin {
    /// Find an action by name or simile
    pub fn action(&self, name: &str) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|a| a.name() == name || a.similes().contains(&name))
            .map(|a| a.as_ref())
    }

    pub fn provider(&self, name: &str) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }
}

/// Assemble the full plugin kit.
///
/// Everything stateful is injected; credentials stay behind the settings
/// seam and are validated per invocation, so building the kit needs no key.
pub fn default_kit(coordinator: Arc<TaskCoordinator>) -> Result<Vec<Plugin>> {
    Ok(vec![
        wallet::wallet_plugin(),
        swap::swap_plugin()?,
        bridge::bridge_plugin(),
        lending::lending_plugin(),
        vault::vault_plugin(coordinator),
    ])
}
