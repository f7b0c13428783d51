//! Risk alerts

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
}

impl RiskAlert {
    pub fn new(
        alert_type: impl Into<String>,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Channel body: `[SEVERITY] type: message`, with an extra
    /// `CRITICAL: ` lead-in at critical severity.
    pub fn formatted(&self) -> String {
        let line = format!(
            "[{}] {}: {}",
            self.severity.as_str().to_uppercase(),
            self.alert_type,
            self.message
        );
        if self.severity == AlertSeverity::Critical {
            format!("CRITICAL: {}", line)
        } else {
            line
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formatted_includes_severity_and_type() {
        let alert = RiskAlert::new(
            "HEALTH_FACTOR_LOW",
            AlertSeverity::Medium,
            "health factor at 1.21",
        );
        assert_eq!(
            alert.formatted(),
            "[MEDIUM] HEALTH_FACTOR_LOW: health factor at 1.21"
        );
    }

    #[test]
    fn critical_alerts_get_a_prefix() {
        let alert = RiskAlert::new("LIQUIDATION_IMMINENT", AlertSeverity::Critical, "act now");
        assert_eq!(
            alert.formatted(),
            "CRITICAL: [CRITICAL] LIQUIDATION_IMMINENT: act now"
        );
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AlertSeverity::High).unwrap(),
            json!("high")
        );
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }
}
