//! Pre-flight risk gate
//!
//! Runs before any on-chain action is delegated. The checks are pure
//! functions over the recorded portfolio snapshot so they stay trivially
//! testable; the workflows fetch state and feed it in.

use serde::Serialize;

use crate::config::WorkflowLimits;
use crate::coordination::PortfolioState;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskAssessment {
    /// Projected health factor after the withdrawal
    pub post_health_factor: f64,
    /// Requested amount as a fraction of portfolio value
    pub withdrawal_ratio: f64,
}

/// Gate a withdrawal against the recorded snapshot.
///
/// The projection assumes debt stays put while collateral shrinks:
/// `post_health = health × (remaining / total)`. Rejected when the amount
/// takes more than the configured fraction of the portfolio, or when the
/// projection lands under the minimum health factor.
pub fn check_withdrawal(
    state: &PortfolioState,
    amount: f64,
    limits: &WorkflowLimits,
) -> Result<RiskAssessment> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "withdrawal amount must be positive, got {}",
            amount
        )));
    }

    let total = state.total_usdc_value;
    if total <= 0.0 {
        return Err(Error::Blocked(
            "no recorded portfolio value to withdraw against".to_string(),
        ));
    }

    let withdrawal_ratio = amount / total;
    if withdrawal_ratio > limits.max_withdrawal_ratio {
        return Err(Error::Blocked(format!(
            "withdrawal of {:.2} USDC exceeds {:.0}% of portfolio value ({:.2} USDC)",
            amount,
            limits.max_withdrawal_ratio * 100.0,
            total
        )));
    }

    let post_health_factor = state.health_factor * ((total - amount) / total);
    if post_health_factor < limits.min_health_factor {
        return Err(Error::Blocked(format!(
            "projected health factor {:.3} below minimum {:.2}",
            post_health_factor, limits.min_health_factor
        )));
    }

    Ok(RiskAssessment {
        post_health_factor,
        withdrawal_ratio,
    })
}

/// Gate a deposit: adding leverage to an already unhealthy position is
/// refused. A missing snapshot is a first deposit and passes.
pub fn check_deposit(state: Option<&PortfolioState>, limits: &WorkflowLimits) -> Result<()> {
    if let Some(state) = state {
        if state.total_usdc_value > 0.0 && state.health_factor < limits.min_health_factor {
            return Err(Error::Blocked(format!(
                "health factor {:.3} below minimum {:.2}, deposits paused until the position recovers",
                state.health_factor, limits.min_health_factor
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portfolio(total: f64, health: f64) -> PortfolioState {
        PortfolioState {
            total_usdc_value: total,
            leverage_ratio: 2.0,
            health_factor: health,
            ..Default::default()
        }
    }

    #[test]
    fn oversized_withdrawal_hits_the_cap() {
        let err = check_withdrawal(&portfolio(1000.0, 1.2), 900.0, &WorkflowLimits::default())
            .unwrap_err();
        assert!(matches!(err, Error::Blocked(_)));
        assert!(err.to_string().contains("exceeds 80%"));
    }

    #[test]
    fn unhealthy_projection_is_blocked() {
        // 1.2 * (900 / 1000) = 1.08, under the 1.15 floor
        let err = check_withdrawal(&portfolio(1000.0, 1.2), 100.0, &WorkflowLimits::default())
            .unwrap_err();
        assert!(err.to_string().contains("projected health factor 1.080"));
    }

    #[test]
    fn healthy_withdrawal_passes_with_assessment() {
        let assessment =
            check_withdrawal(&portfolio(10_000.0, 1.5), 1000.0, &WorkflowLimits::default())
                .unwrap();
        assert!((assessment.post_health_factor - 1.35).abs() < 1e-9);
        assert!((assessment.withdrawal_ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn cap_is_checked_before_health() {
        // Both limits violated; the cap message wins
        let err = check_withdrawal(&portfolio(1000.0, 1.0), 950.0, &WorkflowLimits::default())
            .unwrap_err();
        assert!(err.to_string().contains("exceeds 80%"));
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let limits = WorkflowLimits::default();
        assert!(matches!(
            check_withdrawal(&portfolio(1000.0, 1.5), 0.0, &limits),
            Err(Error::InvalidArgument(_))
        ));
        assert!(check_withdrawal(&portfolio(1000.0, 1.5), -5.0, &limits).is_err());
        assert!(check_withdrawal(&portfolio(1000.0, 1.5), f64::NAN, &limits).is_err());
    }

    #[test]
    fn empty_portfolio_blocks_withdrawal() {
        let err = check_withdrawal(&portfolio(0.0, 0.0), 10.0, &WorkflowLimits::default())
            .unwrap_err();
        assert!(err.to_string().contains("no recorded portfolio value"));
    }

    #[test]
    fn deposit_passes_without_prior_state() {
        assert!(check_deposit(None, &WorkflowLimits::default()).is_ok());
    }

    #[test]
    fn deposit_passes_on_empty_snapshot() {
        // A defaulted record (all zeros) must not block the first deposit
        let state = PortfolioState::default();
        assert!(check_deposit(Some(&state), &WorkflowLimits::default()).is_ok());
    }

    #[test]
    fn deposit_blocked_on_unhealthy_position() {
        let err = check_deposit(Some(&portfolio(1000.0, 1.0)), &WorkflowLimits::default())
            .unwrap_err();
        assert!(matches!(err, Error::Blocked(_)));
        assert!(err.to_string().contains("deposits paused"));
    }

    #[test]
    fn deposit_passes_on_healthy_position() {
        assert!(check_deposit(Some(&portfolio(1000.0, 1.6)), &WorkflowLimits::default()).is_ok());
    }
}
