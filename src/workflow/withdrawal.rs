//! Eight-step leveraged withdrawal
//!
//! risk assessment -> calculate repayment -> repay loan -> withdraw
//! collateral -> treasury transfer -> swap to USDC -> bridge to user ->
//! reconcile portfolio. The risk gate runs locally before anything is
//! delegated; every later step is a durable handoff to its agent.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::WorkflowLimits;
use crate::coordination::{AlertSeverity, PortfolioUpdate, RiskAlert, TaskCoordinator};
use crate::{Error, Result};

use super::{
    risk, Step, Workflow, WorkflowReport, WorkflowStatus, ORCHESTRATOR_AGENT,
    WORKFLOW_ERROR_ALERT, WORKFLOW_FAILURE_ALERT,
};

#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub user_id: String,
    pub amount_usdc: f64,
    /// Chain or address the bridged funds should land on
    pub destination: String,
}

pub struct WithdrawalWorkflow {
    coordinator: Arc<TaskCoordinator>,
    limits: WorkflowLimits,
    request: WithdrawalRequest,
    workflow: Workflow,
}

fn withdrawal_steps() -> Vec<Step> {
    vec![
        Step::new(
            "risk-assessment",
            "risk-manager",
            "assess_withdrawal",
            "Assess withdrawal against health factor limits",
        ),
        Step::new(
            "calculate-repayment",
            "lending-agent",
            "calculate_repayment",
            "Calculate loan repayment for the withdrawal",
        ),
        Step::new(
            "repay-loan",
            "lending-agent",
            "repay_loan",
            "Repay loan portion to unlock collateral",
        ),
        Step::new(
            "withdraw-collateral",
            "lending-agent",
            "withdraw_collateral",
            "Withdraw collateral from the lending pool",
        ),
        Step::new(
            "treasury-transfer",
            "treasury-agent",
            "transfer_to_treasury",
            "Transfer withdrawn funds to the treasury wallet",
        ),
        Step::new(
            "swap-to-base",
            "swap-agent",
            "swap_to_usdc",
            "Swap withdrawn collateral to USDC",
        ),
        Step::new(
            "bridge-to-user",
            "bridge-agent",
            "bridge_to_user",
            "Bridge USDC to the user's destination",
        ),
        Step::new(
            "update-portfolio",
            "portfolio-agent",
            "reconcile_portfolio",
            "Reconcile portfolio records after withdrawal",
        ),
    ]
}

impl WithdrawalWorkflow {
    pub fn new(coordinator: Arc<TaskCoordinator>, request: WithdrawalRequest) -> Self {
        Self::with_limits(coordinator, request, WorkflowLimits::default())
    }

    pub fn with_limits(
        coordinator: Arc<TaskCoordinator>,
        request: WithdrawalRequest,
        limits: WorkflowLimits,
    ) -> Self {
        Self {
            coordinator,
            limits,
            request,
            workflow: Workflow::new(withdrawal_steps()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.workflow.id
    }

    /// Run every step in order. Never returns `Err`: failures land in the
    /// returned report and on the alerts channel.
    pub async fn execute(&mut self) -> WorkflowReport {
        info!(
            workflow_id = %self.workflow.id,
            user_id = %self.request.user_id,
            amount_usdc = self.request.amount_usdc,
            "starting withdrawal workflow"
        );

        for index in 0..self.workflow.steps.len() {
            self.workflow.begin(index);
            match self.run_step(index).await {
                Ok(result) => self.workflow.complete(index, result),
                Err(err) => {
                    let description = self.workflow.steps[index].description;
                    warn!(
                        workflow_id = %self.workflow.id,
                        step = self.workflow.steps[index].id,
                        error = %err,
                        "withdrawal step failed"
                    );
                    self.workflow.fail(index, &err);
                    self.alert_step_failure(description, &err).await;
                    return self.workflow.report();
                }
            }
        }

        // Snapshot recompute happens outside the steps; its failure is an
        // engine error, not a step failure.
        if let Err(err) = self.finalize_portfolio().await {
            error!(
                workflow_id = %self.workflow.id,
                error = %err,
                "withdrawal finalization failed"
            );
            self.workflow.status = WorkflowStatus::Failed;
            self.alert_engine_error(&err).await;
            return self.workflow.report();
        }

        info!(workflow_id = %self.workflow.id, "withdrawal workflow completed");
        self.workflow.report()
    }

    async fn run_step(&self, index: usize) -> Result<Value> {
        let step = &self.workflow.steps[index];
        match step.id {
            "risk-assessment" => self.assess_risk().await,
            _ => self.delegate(step).await,
        }
    }

    async fn assess_risk(&self) -> Result<Value> {
        let state = self
            .coordinator
            .portfolio_state(&self.request.user_id)
            .await?;
        let Some(state) = state else {
            return Err(Error::Blocked(format!(
                "no portfolio state on record for {}",
                self.request.user_id
            )));
        };
        let assessment = risk::check_withdrawal(&state, self.request.amount_usdc, &self.limits)?;
        Ok(serde_json::to_value(assessment)?)
    }

    /// A delegation step completes once the handoff is durably recorded;
    /// the downstream agent finishes on its own time.
    async fn delegate(&self, step: &Step) -> Result<Value> {
        let payload = json!({
            "workflow_id": self.workflow.id,
            "step_id": step.id,
            "user_id": self.request.user_id,
            "amount_usdc": self.request.amount_usdc,
            "destination": self.request.destination,
            "priority": "high",
        });
        let task_id = self
            .coordinator
            .delegate_task(ORCHESTRATOR_AGENT, step.agent, step.action, payload)
            .await?;
        Ok(json!({ "task_id": task_id }))
    }

    async fn finalize_portfolio(&self) -> Result<()> {
        let state = self
            .coordinator
            .portfolio_state(&self.request.user_id)
            .await?
            .ok_or_else(|| {
                Error::Chain(format!(
                    "portfolio record for {} vanished during the workflow",
                    self.request.user_id
                ))
            })?;

        // Heuristic recompute: the withdrawn amount leaves the position,
        // deleveraging it by a flat 10% and lifting health proportionally.
        let remaining = (state.total_usdc_value - self.request.amount_usdc).max(0.0);
        let update = PortfolioUpdate {
            total_usdc_value: Some(remaining),
            leverage_ratio: Some(state.leverage_ratio * 0.9),
            health_factor: Some(state.health_factor / 0.9),
            ..Default::default()
        };
        self.coordinator
            .update_portfolio_state(&self.request.user_id, update)
            .await?;
        Ok(())
    }

    async fn alert_step_failure(&self, description: &str, err: &Error) {
        let alert = RiskAlert::new(
            WORKFLOW_FAILURE_ALERT,
            AlertSeverity::Medium,
            format!("step '{}' failed: {}", description, err),
        )
        .with_metadata(json!({
            "workflow_id": self.workflow.id,
            "workflow": "withdrawal",
            "user_id": self.request.user_id,
        }));
        if let Err(alert_err) = self.coordinator.send_risk_alert(alert).await {
            warn!(error = %alert_err, "failed to publish workflow failure alert");
        }
    }

    async fn alert_engine_error(&self, err: &Error) {
        let alert = RiskAlert::new(
            WORKFLOW_ERROR_ALERT,
            AlertSeverity::High,
            format!("withdrawal workflow error outside step execution: {}", err),
        )
        .with_metadata(json!({
            "workflow_id": self.workflow.id,
            "workflow": "withdrawal",
            "user_id": self.request.user_id,
        }));
        if let Err(alert_err) = self.coordinator.send_risk_alert(alert).await {
            warn!(error = %alert_err, "failed to publish workflow error alert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{
        InMemoryBus, InMemoryKvStore, KvStore, ALERTS_CHANNEL,
    };

    fn request(amount: f64) -> WithdrawalRequest {
        WithdrawalRequest {
            user_id: "u1".to_string(),
            amount_usdc: amount,
            destination: "arbitrum".to_string(),
        }
    }

    async fn seeded_coordinator(
        total: f64,
        health: f64,
    ) -> (Arc<TaskCoordinator>, Arc<InMemoryKvStore>) {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = Arc::new(TaskCoordinator::new(
            store.clone(),
            Arc::new(InMemoryBus::new()),
        ));
        coordinator
            .update_portfolio_state(
                "u1",
                PortfolioUpdate {
                    total_usdc_value: Some(total),
                    leverage_ratio: Some(2.0),
                    health_factor: Some(health),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (coordinator, store)
    }

    #[tokio::test]
    async fn oversized_withdrawal_rejected_before_any_delegation() {
        let (coordinator, store) = seeded_coordinator(1000.0, 1.2).await;
        let mut workflow = WithdrawalWorkflow::new(coordinator.clone(), request(900.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Failed);
        assert_eq!(report.progress, 0);
        assert!(store.keys("task:").await.unwrap().is_empty());

        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].body.contains("WORKFLOW_FAILURE"));
        assert!(alerts[0].body.contains("exceeds 80%"));
    }

    #[tokio::test]
    async fn unhealthy_projection_rejected_before_any_delegation() {
        // 1.2 * (900 / 1000) = 1.08, under the 1.15 floor
        let (coordinator, store) = seeded_coordinator(1000.0, 1.2).await;
        let mut workflow = WithdrawalWorkflow::new(coordinator.clone(), request(100.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Failed);
        assert!(store.keys("task:").await.unwrap().is_empty());

        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].body.contains("projected health factor 1.080"));
        // The failed step is named
        assert!(alerts[0]
            .body
            .contains("Assess withdrawal against health factor limits"));
    }

    #[tokio::test]
    async fn withdrawal_without_portfolio_is_rejected() {
        let coordinator = Arc::new(TaskCoordinator::in_memory());
        let mut workflow = WithdrawalWorkflow::new(coordinator.clone(), request(100.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Failed);
        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert!(alerts[0].body.contains("no portfolio state on record"));
    }

    #[tokio::test]
    async fn healthy_withdrawal_runs_all_steps_and_refreshes_portfolio() {
        let (coordinator, store) = seeded_coordinator(10_000.0, 1.5).await;
        let mut workflow = WithdrawalWorkflow::new(coordinator.clone(), request(1000.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Completed);
        assert_eq!(report.progress, 100);
        assert!(report.current_step.is_none());

        // Seven handoffs: every step after the risk assessment
        assert_eq!(store.keys("task:").await.unwrap().len(), 7);
        let lending = coordinator.pending_tasks("lending-agent").await.unwrap();
        assert_eq!(lending.len(), 3);
        assert_eq!(lending[0].task_type, "calculate_repayment");
        assert_eq!(lending[0].payload["priority"], "high");
        assert_eq!(lending[0].payload["destination"], "arbitrum");

        let state = coordinator.portfolio_state("u1").await.unwrap().unwrap();
        assert_eq!(state.total_usdc_value, 9000.0);
        assert!((state.leverage_ratio - 1.8).abs() < 1e-12);
        assert!((state.health_factor - 1.5 / 0.9).abs() < 1e-12);

        // No failure alerts on the happy path
        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert!(alerts.is_empty());
    }
}
