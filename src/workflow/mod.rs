//! Multi-step vault workflows
//!
//! A workflow is a fixed, ordered list of named steps for one user operation
//! (deposit or withdrawal). Most steps hand work to a logical agent through
//! the [`TaskCoordinator`](crate::coordination::TaskCoordinator) and complete
//! once the handoff is durably recorded; the risk gate and the final
//! portfolio recompute run locally. The first failed step aborts the rest.
//!
//! Workflows are in-memory and discarded when terminal. Only the tasks and
//! portfolio state they produced survive in the store.

mod deposit;
mod risk;
mod withdrawal;

pub use deposit::{DepositRequest, DepositWorkflow};
pub use risk::{check_deposit, check_withdrawal, RiskAssessment};
pub use withdrawal::{WithdrawalRequest, WithdrawalWorkflow};

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Alert type for a step that failed during execution
pub const WORKFLOW_FAILURE_ALERT: &str = "WORKFLOW_FAILURE";
/// Alert type for an engine error outside any step's own execution
pub const WORKFLOW_ERROR_ALERT: &str = "WORKFLOW_ERROR";

/// Agent name the engine delegates as
pub(crate) const ORCHESTRATOR_AGENT: &str = "vault-manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: &'static str,
    /// Logical agent responsible for the work
    pub agent: &'static str,
    pub action: &'static str,
    pub description: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    pub fn new(
        id: &'static str,
        agent: &'static str,
        action: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            id,
            agent,
            action,
            description,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize)]
pub struct Workflow {
    pub id: Uuid,
    pub status: WorkflowStatus,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: WorkflowStatus::InProgress,
            steps,
        }
    }

    pub fn begin(&mut self, index: usize) {
        self.steps[index].status = StepStatus::InProgress;
    }

    /// Mark a step completed; the workflow completes with its last step.
    pub fn complete(&mut self, index: usize, result: Value) {
        let step = &mut self.steps[index];
        step.status = StepStatus::Completed;
        step.result = Some(result);
        if self
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed)
        {
            self.status = WorkflowStatus::Completed;
        }
    }

    /// Mark a step failed; the workflow is terminal from here.
    pub fn fail(&mut self, index: usize, error: impl fmt::Display) {
        let step = &mut self.steps[index];
        step.status = StepStatus::Failed;
        step.error = Some(error.to_string());
        self.status = WorkflowStatus::Failed;
    }

    /// Completed steps over total, as a 0-100 percentage
    pub fn progress(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        ((completed * 100) / self.steps.len()) as u8
    }

    /// First step still pending or running
    pub fn current_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| matches!(s.status, StepStatus::Pending | StepStatus::InProgress))
    }

    pub fn report(&self) -> WorkflowReport {
        WorkflowReport {
            workflow_id: self.id,
            status: self.status,
            progress: self.progress(),
            current_step: self.current_step().map(|s| s.description.to_string()),
        }
    }
}

/// Snapshot handed back to callers; serializes for CLI/API output
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_steps() -> Vec<Step> {
        vec![
            Step::new("one", "agent-a", "first", "First step"),
            Step::new("two", "agent-b", "second", "Second step"),
            Step::new("three", "agent-c", "third", "Third step"),
        ]
    }

    #[test]
    fn fresh_workflow_is_in_progress_at_zero() {
        let workflow = Workflow::new(three_steps());
        assert_eq!(workflow.status, WorkflowStatus::InProgress);
        assert_eq!(workflow.progress(), 0);
        assert_eq!(workflow.current_step().map(|s| s.id), Some("one"));
    }

    #[test]
    fn progress_tracks_completed_steps() {
        let mut workflow = Workflow::new(three_steps());
        workflow.begin(0);
        workflow.complete(0, json!({}));
        assert_eq!(workflow.progress(), 33);
        assert_eq!(workflow.current_step().map(|s| s.id), Some("two"));
        assert_eq!(workflow.status, WorkflowStatus::InProgress);
    }

    #[test]
    fn completing_every_step_completes_the_workflow() {
        let mut workflow = Workflow::new(three_steps());
        for i in 0..3 {
            workflow.begin(i);
            workflow.complete(i, json!({ "step": i }));
        }
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_eq!(workflow.progress(), 100);
        assert!(workflow.current_step().is_none());
    }

    #[test]
    fn failing_a_step_fails_the_workflow() {
        let mut workflow = Workflow::new(three_steps());
        workflow.begin(0);
        workflow.complete(0, json!({}));
        workflow.begin(1);
        workflow.fail(1, "agent offline");

        assert_eq!(workflow.status, WorkflowStatus::Failed);
        assert_eq!(workflow.progress(), 33);
        assert_eq!(workflow.steps[1].error.as_deref(), Some("agent offline"));
        // The failed step is terminal, so "current" skips to the next
        assert_eq!(workflow.current_step().map(|s| s.id), Some("three"));
    }

    #[test]
    fn report_serializes_snake_case() {
        let workflow = Workflow::new(three_steps());
        let value = serde_json::to_value(workflow.report()).unwrap();
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["progress"], 0);
        assert_eq!(value["current_step"], "First step");
    }
}
