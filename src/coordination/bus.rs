//! Coordination channels
//!
//! Agents post to named channels and read back a recent window. The bus is a
//! seam like [`KvStore`](super::KvStore): the in-memory implementation covers
//! tests and single-process runs, a networked one can slot in later.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub sender: String,
    pub body: String,
    #[serde(default)]
    pub metadata: Value,
    pub sent_at: DateTime<Utc>,
}

impl ChannelMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            metadata: Value::Null,
            sent_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, channel: &str, message: ChannelMessage) -> Result<(), StoreError>;

    /// The most recent `limit` messages on `channel`, oldest first
    async fn recent(&self, channel: &str, limit: usize)
        -> Result<Vec<ChannelMessage>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBus {
    channels: RwLock<HashMap<String, Vec<ChannelMessage>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, channel: &str, message: ChannelMessage) -> Result<(), StoreError> {
        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, StoreError> {
        let channels = self.channels.read().await;
        let Some(messages) = channels.get(channel) else {
            return Ok(Vec::new());
        };
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_channel_is_empty() {
        let bus = InMemoryBus::new();
        assert!(bus.recent("quiet", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_returns_newest_window_oldest_first() {
        let bus = InMemoryBus::new();
        for i in 0..5 {
            bus.publish("updates", ChannelMessage::new("agent", format!("msg {}", i)))
                .await
                .unwrap();
        }

        let window = bus.recent("updates", 3).await.unwrap();
        let bodies: Vec<_> = window.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn metadata_travels_with_the_message() {
        let bus = InMemoryBus::new();
        let message =
            ChannelMessage::new("agent", "hello").with_metadata(json!({"task_id": "abc"}));
        bus.publish("updates", message).await.unwrap();

        let window = bus.recent("updates", 1).await.unwrap();
        assert_eq!(window[0].metadata["task_id"], "abc");
    }
}
