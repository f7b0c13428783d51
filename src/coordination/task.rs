//! Delegated task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::store::StoreError;

/// Store key prefix for task records
pub const TASK_KEY_PREFIX: &str = "task:";

/// Task lifecycle: pending -> in_progress -> completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Transition table; anything not listed is rejected
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// What an agent hands back when it finishes a task
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Output(Value),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub from_agent: String,
    pub to_agent: String,
    pub task_type: String,
    pub payload: Value,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(from_agent: &str, to_agent: &str, task_type: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            task_type: task_type.to_string(),
            payload,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn key(id: Uuid) -> String {
        format!("{}{}", TASK_KEY_PREFIX, id)
    }

    pub fn storage_key(&self) -> String {
        Self::key(self.id)
    }

    pub fn apply_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Output(value) => self.result = Some(value),
            TaskOutcome::Error(message) => self.error = Some(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("illegal task transition: {from} -> {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    #[error("invalid portfolio update: {0}")]
    InvalidPortfolio(String),

    #[error("malformed record at {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_task_starts_pending() {
        let task = Task::new("orchestrator", "worker", "rebalance", json!({"n": 1}));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
        assert_eq!(task.storage_key(), format!("task:{}", task.id));
    }

    #[test]
    fn legal_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn illegal_transitions() {
        // Skipping in_progress is not allowed
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
        // Terminal states never reopen
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::InProgress));
        // No self-loops
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Failed);
    }

    #[test]
    fn outcome_fills_the_matching_field() {
        let mut task = Task::new("a", "b", "t", Value::Null);
        task.apply_outcome(TaskOutcome::Output(json!({"ok": true})));
        assert_eq!(task.result, Some(json!({"ok": true})));
        assert!(task.error.is_none());

        let mut task = Task::new("a", "b", "t", Value::Null);
        task.apply_outcome(TaskOutcome::Error("boom".into()));
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.result.is_none());
    }
}
