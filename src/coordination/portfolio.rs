//! Shared portfolio state
//!
//! One record per user, merged shallowly: an update overwrites only the
//! fields it carries, and a present `assets` map replaces the stored map
//! whole. Per-asset deltas belong to whoever computes the update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::task::CoordinationError;

/// Store key prefix for portfolio records
pub const PORTFOLIO_KEY_PREFIX: &str = "portfolio:";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetPosition {
    pub amount: f64,
    pub value_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub total_usdc_value: f64,
    pub leverage_ratio: f64,
    pub health_factor: f64,
    #[serde(default)]
    pub assets: HashMap<String, AssetPosition>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PortfolioState {
    fn default() -> Self {
        Self {
            total_usdc_value: 0.0,
            leverage_ratio: 0.0,
            health_factor: 0.0,
            assets: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

impl PortfolioState {
    pub fn key(user_id: &str) -> String {
        format!("{}{}", PORTFOLIO_KEY_PREFIX, user_id)
    }

    /// Shallow merge: provided fields overwrite, absent fields stay
    pub fn apply(&mut self, update: PortfolioUpdate) {
        if let Some(total) = update.total_usdc_value {
            self.total_usdc_value = total;
        }
        if let Some(leverage) = update.leverage_ratio {
            self.leverage_ratio = leverage;
        }
        if let Some(health) = update.health_factor {
            self.health_factor = health;
        }
        if let Some(assets) = update.assets {
            self.assets = assets;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_usdc_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<HashMap<String, AssetPosition>>,
}

impl PortfolioUpdate {
    /// Every value a portfolio carries is a magnitude; negatives and
    /// non-finite numbers are always a caller bug.
    pub fn validate(&self) -> Result<(), CoordinationError> {
        let scalars = [
            ("total_usdc_value", self.total_usdc_value),
            ("leverage_ratio", self.leverage_ratio),
            ("health_factor", self.health_factor),
        ];
        for (name, value) in scalars {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(CoordinationError::InvalidPortfolio(format!(
                        "{} must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }
        if let Some(assets) = &self.assets {
            for (symbol, position) in assets {
                if !position.amount.is_finite()
                    || position.amount < 0.0
                    || !position.value_usd.is_finite()
                    || position.value_usd < 0.0
                {
                    return Err(CoordinationError::InvalidPortfolio(format!(
                        "asset {} has a negative or non-finite position",
                        symbol
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_merges_only_provided_fields() {
        let mut state = PortfolioState {
            total_usdc_value: 1000.0,
            leverage_ratio: 2.0,
            health_factor: 1.5,
            ..Default::default()
        };

        state.apply(PortfolioUpdate {
            leverage_ratio: Some(2.5),
            ..Default::default()
        });

        assert_eq!(state.total_usdc_value, 1000.0);
        assert_eq!(state.leverage_ratio, 2.5);
        assert_eq!(state.health_factor, 1.5);
    }

    #[test]
    fn apply_replaces_assets_whole() {
        let mut state = PortfolioState::default();
        state.assets.insert(
            "WETH".to_string(),
            AssetPosition {
                amount: 1.0,
                value_usd: 3000.0,
            },
        );

        let mut assets = HashMap::new();
        assets.insert(
            "USDC".to_string(),
            AssetPosition {
                amount: 500.0,
                value_usd: 500.0,
            },
        );
        state.apply(PortfolioUpdate {
            assets: Some(assets),
            ..Default::default()
        });

        assert!(!state.assets.contains_key("WETH"));
        assert_eq!(state.assets["USDC"].value_usd, 500.0);
    }

    #[test]
    fn validate_rejects_negative_scalars() {
        let update = PortfolioUpdate {
            total_usdc_value: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(),
            Err(CoordinationError::InvalidPortfolio(_))
        ));
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        let update = PortfolioUpdate {
            health_factor: Some(f64::NAN),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = PortfolioUpdate {
            leverage_ratio: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_positions() {
        let mut assets = HashMap::new();
        assets.insert(
            "DAI".to_string(),
            AssetPosition {
                amount: -1.0,
                value_usd: 1.0,
            },
        );
        let update = PortfolioUpdate {
            assets: Some(assets),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn empty_update_validates() {
        assert!(PortfolioUpdate::default().validate().is_ok());
    }
}
