//! Vault plugin: multi-step deposit and withdrawal workflows
//!
//! The actions here never touch a chain directly. They drive the workflow
//! engine, which hands each step to the responsible agent through the task
//! coordinator and applies the risk gate before anything irreversible.

use crate::config::WorkflowLimits;
use crate::coordination::TaskCoordinator;
use crate::intent;
use crate::plugins::{Action, ActionContext, ActionResponse, Plugin, Provider};
use crate::workflow::{
    DepositRequest, DepositWorkflow, WithdrawalRequest, WithdrawalWorkflow, WorkflowStatus,
};
use crate::Result;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn vault_plugin(coordinator: Arc<TaskCoordinator>) -> Plugin {
    let limits = WorkflowLimits::default();
    Plugin {
        name: "vault",
        description: "Leveraged vault deposits and withdrawals driven by the workflow engine",
        actions: vec![
            Box::new(VaultDepositAction {
                coordinator: Arc::clone(&coordinator),
                limits,
            }),
            Box::new(VaultWithdrawAction {
                coordinator: Arc::clone(&coordinator),
                limits,
            }),
        ],
        providers: vec![Box::new(PortfolioProvider { coordinator })],
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct VaultDepositInput {
    /// Amount in USDC
    amount: f64,
    /// Chain the funds arrive from (defaults to ethereum)
    source: Option<String>,
}

struct VaultDepositAction {
    coordinator: Arc<TaskCoordinator>,
    limits: WorkflowLimits,
}

#[async_trait]
impl Action for VaultDepositAction {
    fn name(&self) -> &'static str {
        "VAULT_DEPOSIT"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["DEPOSIT_TO_VAULT", "ENTER_VAULT"]
    }

    fn description(&self) -> &'static str {
        "Deposit USDC into the leveraged vault via the multi-step workflow"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "deposit 1000 USDC into the vault",
            "put 500 USDC in the vault from base",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(VaultDepositInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_amount(&ctx.message).is_some()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I deposit? Include an amount, e.g. 'deposit 1000 USDC'.",
            ));
        };
        let source = intent::extract_source(&ctx.message)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| "ethereum".to_string());

        let request = DepositRequest {
            user_id: ctx.user_id.clone(),
            amount_usdc: amount,
            source,
        };
        let mut workflow =
            DepositWorkflow::with_limits(Arc::clone(&self.coordinator), request, self.limits);
        let report = workflow.execute().await;

        let completed = report.status == WorkflowStatus::Completed;
        let text = if completed {
            format!(
                "Vault deposit of {} USDC for {} completed.",
                amount, ctx.user_id
            )
        } else {
            format!(
                "Vault deposit did not complete (progress {}%). Check the alerts channel for the failing step.",
                report.progress
            )
        };
        let data = json!({ "report": report });
        Ok(if completed {
            ActionResponse::ok_with_data(text, data)
        } else {
            ActionResponse {
                text,
                success: false,
                data: Some(data),
            }
        })
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct VaultWithdrawInput {
    /// Amount in USDC
    amount: f64,
    /// Chain the funds should land on (defaults to ethereum)
    destination: Option<String>,
}

struct VaultWithdrawAction {
    coordinator: Arc<TaskCoordinator>,
    limits: WorkflowLimits,
}

#[async_trait]
impl Action for VaultWithdrawAction {
    fn name(&self) -> &'static str {
        "VAULT_WITHDRAW"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["WITHDRAW_FROM_VAULT", "EXIT_VAULT"]
    }

    fn description(&self) -> &'static str {
        "Withdraw USDC from the leveraged vault, risk-gated before any unwinding"
    }

    fn examples(&self) -> &'static [&'static str] {
        &[
            "withdraw 500 USDC from the vault",
            "take 1000 USDC out of the vault to arbitrum",
        ]
    }

    fn input_schema(&self) -> Value {
        schema_for!(VaultWithdrawInput).to_value()
    }

    async fn validate(&self, ctx: &ActionContext) -> bool {
        intent::extract_amount(&ctx.message).is_some()
    }

    async fn handle(&self, ctx: &ActionContext) -> Result<ActionResponse> {
        let Some(amount) = intent::extract_amount(&ctx.message) else {
            return Ok(ActionResponse::failure(
                "How much should I withdraw? Include an amount, e.g. 'withdraw 500 USDC'.",
            ));
        };
        let destination = intent::extract_destination(&ctx.message)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| "ethereum".to_string());

        let request = WithdrawalRequest {
            user_id: ctx.user_id.clone(),
            amount_usdc: amount,
            destination,
        };
        let mut workflow =
            WithdrawalWorkflow::with_limits(Arc::clone(&self.coordinator), request, self.limits);
        let report = workflow.execute().await;

        let completed = report.status == WorkflowStatus::Completed;
        let text = if completed {
            format!(
                "Vault withdrawal of {} USDC for {} completed.",
                amount, ctx.user_id
            )
        } else {
            format!(
                "Vault withdrawal did not complete (progress {}%). Check the alerts channel for the failing step.",
                report.progress
            )
        };
        let data = json!({ "report": report });
        Ok(if completed {
            ActionResponse::ok_with_data(text, data)
        } else {
            ActionResponse {
                text,
                success: false,
                data: Some(data),
            }
        })
    }
}

/// Surfaces the caller's recorded portfolio snapshot
struct PortfolioProvider {
    coordinator: Arc<TaskCoordinator>,
}

#[async_trait]
impl Provider for PortfolioProvider {
    fn name(&self) -> &'static str {
        "PORTFOLIO"
    }

    fn description(&self) -> &'static str {
        "The caller's recorded vault position: total value, leverage, health factor"
    }

    async fn get(&self, ctx: &ActionContext) -> Result<String> {
        match self.coordinator.portfolio_state(&ctx.user_id).await? {
            Some(state) => Ok(format!(
                "Portfolio for {}: {:.2} USDC total, leverage {:.2}x, health factor {:.3}",
                ctx.user_id, state.total_usdc_value, state.leverage_ratio, state.health_factor
            )),
            None => Ok(format!("No portfolio on record for {}", ctx.user_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::PortfolioUpdate;

    fn deposit_action() -> VaultDepositAction {
        VaultDepositAction {
            coordinator: Arc::new(TaskCoordinator::in_memory()),
            limits: WorkflowLimits::default(),
        }
    }

    #[tokio::test]
    async fn deposit_runs_the_workflow_to_completion() {
        let action = deposit_action();
        let ctx = ActionContext::new("u1", "deposit 1000 USDC into the vault from base");
        let response = action.handle(&ctx).await.unwrap();
        assert!(response.success, "{}", response.text);
        assert!(response.text.contains("completed"));

        let state = action
            .coordinator
            .portfolio_state("u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.total_usdc_value, 1000.0);
    }

    #[tokio::test]
    async fn deposit_without_amount_asks_for_one() {
        let action = deposit_action();
        let ctx = ActionContext::new("u1", "deposit into the vault");
        let response = action.handle(&ctx).await.unwrap();
        assert!(!response.success);
        assert!(response.text.contains("How much"));
    }

    #[tokio::test]
    async fn oversized_withdrawal_reports_failure() {
        let coordinator = Arc::new(TaskCoordinator::in_memory());
        coordinator
            .update_portfolio_state(
                "u1",
                PortfolioUpdate {
                    total_usdc_value: Some(1000.0),
                    health_factor: Some(1.2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let action = VaultWithdrawAction {
            coordinator,
            limits: WorkflowLimits::default(),
        };
        let ctx = ActionContext::new("u1", "withdraw 900 USDC from the vault");
        let response = action.handle(&ctx).await.unwrap();
        assert!(!response.success);
        assert!(response.text.contains("did not complete"));
    }

    #[tokio::test]
    async fn portfolio_provider_reports_the_snapshot() {
        let coordinator = Arc::new(TaskCoordinator::in_memory());
        coordinator
            .update_portfolio_state(
                "u1",
                PortfolioUpdate {
                    total_usdc_value: Some(2500.0),
                    leverage_ratio: Some(2.0),
                    health_factor: Some(1.6),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let provider = PortfolioProvider { coordinator };
        let ctx = ActionContext::new("u1", "status please");
        let text = provider.get(&ctx).await.unwrap();
        assert!(text.contains("2500.00"));
        assert!(text.contains("1.600"));
    }
}
