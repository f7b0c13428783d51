//! Six-step leveraged deposit
//!
//! risk check -> bridge deposit in -> swap to collateral -> supply
//! collateral -> borrow against it -> reconcile portfolio. Mirrors the
//! withdrawal flow: local risk gate first, durable handoffs after.

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
pub struct DepositRequest {
    pub user_id: String,
    pub amount_usdc: f64,
    /// Chain the user's funds arrive from
    pub source: String,
}

pub struct DepositWorkflow {
    coordinator: Arc<TaskCoordinator>,
    limits: WorkflowLimits,
    request: DepositRequest,
    workflow: Workflow,
}

fn deposit_steps() -> Vec<Step> {
    vec![
        Step::new(
            "risk-check",
            "risk-manager",
            "check_deposit",
            "Check position health before adding leverage",
        ),
        Step::new(
            "bridge-deposit",
            "bridge-agent",
            "bridge_deposit",
            "Bridge deposited funds to the vault chain",
        ),
        Step::new(
            "swap-to-collateral",
            "swap-agent",
            "swap_to_collateral",
            "Swap deposit to the collateral asset",
        ),
        Step::new(
            "supply-collateral",
            "lending-agent",
            "supply_collateral",
            "Supply collateral to the lending pool",
        ),
        Step::new(
            "borrow-stable",
            "lending-agent",
            "borrow_stable",
            "Borrow stables against the new collateral",
        ),
        Step::new(
            "update-portfolio",
            "portfolio-agent",
            "reconcile_portfolio",
            "Reconcile portfolio records after deposit",
        ),
    ]
}

impl DepositWorkflow {
    pub fn new(coordinator: Arc<TaskCoordinator>, request: DepositRequest) -> Self {
        Self::with_limits(coordinator, request, WorkflowLimits::default())
    }

    pub fn with_limits(
        coordinator: Arc<TaskCoordinator>,
        request: DepositRequest,
        limits: WorkflowLimits,
    ) -> Self {
        Self {
            coordinator,
            limits,
            request,
            workflow: Workflow::new(deposit_steps()),
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
            "starting deposit workflow"
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
                        "deposit step failed"
                    );
                    self.workflow.fail(index, &err);
                    self.alert_step_failure(description, &err).await;
                    return self.workflow.report();
                }
            }
        }

        if let Err(err) = self.finalize_portfolio().await {
            error!(
                workflow_id = %self.workflow.id,
                error = %err,
                "deposit finalization failed"
            );
            self.workflow.status = WorkflowStatus::Failed;
            self.alert_engine_error(&err).await;
            return self.workflow.report();
        }

        info!(workflow_id = %self.workflow.id, "deposit workflow completed");
        self.workflow.report()
    }

    async fn run_step(&self, index: usize) -> Result<Value> {
        let step = &self.workflow.steps[index];
        match step.id {
            "risk-check" => self.check_risk().await,
            _ => self.delegate(step).await,
        }
    }

    async fn check_risk(&self) -> Result<Value> {
        if !self.request.amount_usdc.is_finite() || self.request.amount_usdc <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "deposit amount must be positive, got {}",
                self.request.amount_usdc
            )));
        }
        let state = self
            .coordinator
            .portfolio_state(&self.request.user_id)
            .await?;
        risk::check_deposit(state.as_ref(), &self.limits)?;
        Ok(json!({
            "approved": true,
            "prior_health_factor": state.map(|s| s.health_factor),
        }))
    }

    async fn delegate(&self, step: &Step) -> Result<Value> {
        let payload = json!({
            "workflow_id": self.workflow.id,
            "step_id": step.id,
            "user_id": self.request.user_id,
            "amount_usdc": self.request.amount_usdc,
            "source": self.request.source,
            "priority": "normal",
        });
        let task_id = self
            .coordinator
            .delegate_task(ORCHESTRATOR_AGENT, step.agent, step.action, payload)
            .await?;
        Ok(json!({ "task_id": task_id }))
    }

    async fn finalize_portfolio(&self) -> Result<()> {
        let amount = self.request.amount_usdc;
        let prior = self
            .coordinator
            .portfolio_state(&self.request.user_id)
            .await?;

        let update = match prior {
            Some(state) if state.total_usdc_value > 0.0 => {
                // Fresh collateral with unchanged debt lifts health in
                // proportion to the growth.
                let new_total = state.total_usdc_value + amount;
                let growth = new_total / state.total_usdc_value;
                PortfolioUpdate {
                    total_usdc_value: Some(new_total),
                    health_factor: Some(state.health_factor * growth),
                    ..Default::default()
                }
            }
            // First deposit seeds an unleveraged position
            _ => PortfolioUpdate {
                total_usdc_value: Some(amount),
                leverage_ratio: Some(1.0),
                health_factor: Some(2.0),
                ..Default::default()
            },
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
            "workflow": "deposit",
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
            format!("deposit workflow error outside step execution: {}", err),
        )
        .with_metadata(json!({
            "workflow_id": self.workflow.id,
            "workflow": "deposit",
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
    use async_trait::async_trait;
    use crate::coordination::{
        InMemoryBus, InMemoryKvStore, KvStore, StoreError, ALERTS_CHANNEL,
    };
    // `super::*` pulls in the one-parameter `crate::Result` alias; the
    // `KvStore` impl below needs the two-parameter std form.
    use std::result::Result;

    fn request(amount: f64) -> DepositRequest {
        DepositRequest {
            user_id: "u1".to_string(),
            amount_usdc: amount,
            source: "base".to_string(),
        }
    }

    #[tokio::test]
    async fn first_deposit_completes_and_seeds_the_portfolio() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = Arc::new(TaskCoordinator::new(
            store.clone(),
            Arc::new(InMemoryBus::new()),
        ));

        let mut workflow = DepositWorkflow::new(coordinator.clone(), request(1000.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Completed);
        assert_eq!(report.progress, 100);
        assert!(report.current_step.is_none());

        let state = coordinator.portfolio_state("u1").await.unwrap().unwrap();
        assert_eq!(state.total_usdc_value, 1000.0);
        assert_eq!(state.leverage_ratio, 1.0);
        assert_eq!(state.health_factor, 2.0);

        // Five handoffs: every step after the risk check
        assert_eq!(store.keys("task:").await.unwrap().len(), 5);
        let pending = coordinator.pending_tasks("bridge-agent").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_type, "bridge_deposit");
        assert_eq!(pending[0].payload["user_id"], "u1");
        assert_eq!(pending[0].payload["amount_usdc"], 1000.0);
        assert_eq!(pending[0].payload["source"], "base");
        assert_eq!(pending[0].payload["priority"], "normal");
        assert!(pending[0].payload["workflow_id"].is_string());
    }

    #[tokio::test]
    async fn second_deposit_grows_total_and_health() {
        let coordinator = Arc::new(TaskCoordinator::in_memory());
        DepositWorkflow::new(coordinator.clone(), request(1000.0))
            .execute()
            .await;
        let report = DepositWorkflow::new(coordinator.clone(), request(1000.0))
            .execute()
            .await;

        assert_eq!(report.status, WorkflowStatus::Completed);
        let state = coordinator.portfolio_state("u1").await.unwrap().unwrap();
        assert_eq!(state.total_usdc_value, 2000.0);
        assert_eq!(state.health_factor, 4.0);
        assert_eq!(state.leverage_ratio, 1.0);
    }

    #[tokio::test]
    async fn deposit_on_unhealthy_position_is_blocked() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = Arc::new(TaskCoordinator::new(
            store.clone(),
            Arc::new(InMemoryBus::new()),
        ));
        coordinator
            .update_portfolio_state(
                "u1",
                PortfolioUpdate {
                    total_usdc_value: Some(1000.0),
                    leverage_ratio: Some(3.0),
                    health_factor: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = DepositWorkflow::new(coordinator.clone(), request(500.0))
            .execute()
            .await;

        assert_eq!(report.status, WorkflowStatus::Failed);
        assert_eq!(report.progress, 0);
        assert!(store.keys("task:").await.unwrap().is_empty());

        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].body.contains("deposits paused"));
    }

    /// Store double whose task writes fail, as a dead persistence backend
    /// would
    struct FailingKvStore {
        inner: InMemoryKvStore,
    }

    #[async_trait]
    impl KvStore for FailingKvStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            if key.starts_with("task:") {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.keys(prefix).await
        }
    }

    #[tokio::test]
    async fn failed_handoff_fails_the_workflow_with_one_alert() {
        let coordinator = Arc::new(TaskCoordinator::new(
            Arc::new(FailingKvStore {
                inner: InMemoryKvStore::new(),
            }),
            Arc::new(InMemoryBus::new()),
        ));

        let mut workflow = DepositWorkflow::new(coordinator.clone(), request(500.0));
        let report = workflow.execute().await;

        assert_eq!(report.status, WorkflowStatus::Failed);
        assert!(report.progress < 100);
        // Risk check passed, the first handoff broke
        assert_eq!(report.progress, 16);

        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].body.contains("WORKFLOW_FAILURE"));
        assert!(alerts[0]
            .body
            .contains("Bridge deposited funds to the vault chain"));
        assert_eq!(alerts[0].metadata["severity"], "medium");
    }

    #[tokio::test]
    async fn non_positive_deposit_amount_is_invalid() {
        let coordinator = Arc::new(TaskCoordinator::in_memory());
        let report = DepositWorkflow::new(coordinator.clone(), request(0.0))
            .execute()
            .await;
        assert_eq!(report.status, WorkflowStatus::Failed);
        let alerts = coordinator
            .coordination_messages(ALERTS_CHANNEL, 10)
            .await
            .unwrap();
        assert!(alerts[0].body.contains("must be positive"));
    }
}
