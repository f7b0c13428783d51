//! Task coordination between agents
//!
//! The coordinator is a mailbox, not a scheduler: delegation writes a task
//! record and announces it on the coordination channel, and the target agent
//! polls for pending work addressed to it. Task status moves through an
//! enforced lifecycle (pending -> in_progress -> completed | failed), so a
//! finished task can never silently reopen. Portfolio state and risk alerts
//! ride the same store and bus so every agent sees one view of the vault.
//!
//! Both backends are injected ([`KvStore`] and [`MessageBus`]); nothing in
//! here reaches for process-global state.

mod alert;
mod bus;
mod portfolio;
mod store;
mod task;

pub use alert::{AlertSeverity, RiskAlert};
pub use bus::{ChannelMessage, InMemoryBus, MessageBus};
pub use portfolio::{AssetPosition, PortfolioState, PortfolioUpdate, PORTFOLIO_KEY_PREFIX};
pub use store::{FileKvStore, InMemoryKvStore, KvStore, StoreError};
pub use task::{CoordinationError, Task, TaskOutcome, TaskStatus, TASK_KEY_PREFIX};

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Channel for delegation traffic
pub const COORDINATION_CHANNEL: &str = "coordination";
/// Channel for risk alerts
pub const ALERTS_CHANNEL: &str = "alerts";

#[derive(Clone)]
pub struct TaskCoordinator {
    store: Arc<dyn KvStore>,
    bus: Arc<dyn MessageBus>,
}

impl TaskCoordinator {
    pub fn new(store: Arc<dyn KvStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, bus }
    }

    /// Fully in-memory coordinator for tests and one-shot runs
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryKvStore::new()),
            Arc::new(InMemoryBus::new()),
        )
    }

    /// Record a task for `to_agent` and announce it on the coordination
    /// channel. Returns the task id once the handoff is durable.
    pub async fn delegate_task(
        &self,
        from_agent: &str,
        to_agent: &str,
        task_type: &str,
        payload: Value,
    ) -> Result<Uuid, CoordinationError> {
        let task = Task::new(from_agent, to_agent, task_type, payload);
        let record = serde_json::to_value(&task)?;
        self.store.set(&task.storage_key(), record).await?;

        let message = ChannelMessage::new(
            from_agent,
            format!("delegated {} to {} (task {})", task_type, to_agent, task.id),
        )
        .with_metadata(json!({
            "task_id": task.id,
            "to_agent": to_agent,
            "task_type": task_type,
        }));
        self.bus.publish(COORDINATION_CHANNEL, message).await?;

        info!(
            task_id = %task.id,
            from_agent,
            to_agent,
            task_type,
            "task delegated"
        );
        Ok(task.id)
    }

    /// Pending tasks addressed to `agent`, oldest first.
    ///
    /// Creation-time ties keep store insertion order (the sort is stable).
    pub async fn pending_tasks(&self, agent: &str) -> Result<Vec<Task>, CoordinationError> {
        let keys = self.store.keys(TASK_KEY_PREFIX).await?;
        let mut tasks = Vec::new();
        for key in keys {
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            let task: Task = serde_json::from_value(value)
                .map_err(|source| CoordinationError::Corrupt { key, source })?;
            if task.to_agent == agent && task.status == TaskStatus::Pending {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    /// Move a task to `status`, attaching the outcome if one is given.
    /// Transitions outside the lifecycle table are rejected without writing.
    pub async fn update_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        outcome: Option<TaskOutcome>,
    ) -> Result<Task, CoordinationError> {
        let key = Task::key(task_id);
        let value = self
            .store
            .get(&key)
            .await?
            .ok_or(CoordinationError::TaskNotFound(task_id))?;
        let mut task: Task = serde_json::from_value(value).map_err(|source| {
            CoordinationError::Corrupt {
                key: key.clone(),
                source,
            }
        })?;

        if !task.status.can_transition_to(status) {
            return Err(CoordinationError::IllegalTransition {
                from: task.status,
                to: status,
            });
        }

        task.status = status;
        if let Some(outcome) = outcome {
            task.apply_outcome(outcome);
        }
        self.store.set(&key, serde_json::to_value(&task)?).await?;

        info!(task_id = %task_id, status = %task.status, "task status updated");
        Ok(task)
    }

    /// Merge `update` into the user's portfolio record, creating it on first
    /// touch. The update is validated before anything is read or written.
    pub async fn update_portfolio_state(
        &self,
        user_id: &str,
        update: PortfolioUpdate,
    ) -> Result<PortfolioState, CoordinationError> {
        update.validate()?;

        let key = PortfolioState::key(user_id);
        let mut state = match self.store.get(&key).await? {
            Some(value) => serde_json::from_value(value).map_err(|source| {
                CoordinationError::Corrupt {
                    key: key.clone(),
                    source,
                }
            })?,
            None => PortfolioState::default(),
        };

        state.apply(update);
        self.store.set(&key, serde_json::to_value(&state)?).await?;

        debug!(
            user_id,
            total_usdc_value = state.total_usdc_value,
            health_factor = state.health_factor,
            "portfolio state updated"
        );
        Ok(state)
    }

    pub async fn portfolio_state(
        &self,
        user_id: &str,
    ) -> Result<Option<PortfolioState>, CoordinationError> {
        let key = PortfolioState::key(user_id);
        match self.store.get(&key).await? {
            Some(value) => {
                let state = serde_json::from_value(value)
                    .map_err(|source| CoordinationError::Corrupt { key, source })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Publish a risk alert to the alerts channel
    pub async fn send_risk_alert(&self, alert: RiskAlert) -> Result<(), CoordinationError> {
        match alert.severity {
            AlertSeverity::High | AlertSeverity::Critical => warn!(
                severity = %alert.severity,
                alert_type = %alert.alert_type,
                message = %alert.message,
                "risk alert"
            ),
            _ => info!(
                severity = %alert.severity,
                alert_type = %alert.alert_type,
                message = %alert.message,
                "risk alert"
            ),
        }

        let message = ChannelMessage::new("risk-monitor", alert.formatted()).with_metadata(json!({
            "alert_type": alert.alert_type,
            "severity": alert.severity,
            "details": alert.metadata,
        }));
        self.bus.publish(ALERTS_CHANNEL, message).await?;
        Ok(())
    }

    /// Recent messages on a channel, oldest first
    pub async fn coordination_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, CoordinationError> {
        Ok(self.bus.recent(channel, limit).await?)
    }
}
