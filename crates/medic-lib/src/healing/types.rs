//! Healing action types
//!
//! Shapes produced by the suggestion engine and consumed by the executor:
//! a suggestion with its safety checks and approval flag, and the result
//! of carrying one out.

use crate::confidence::{ActionRecord, ActionStatus};
use crate::models::{ActionKind, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much damage an action can do if it goes wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Outcome of one pre-flight safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

/// One pre-flight safety check with its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub name: String,
    pub description: String,
    pub status: CheckStatus,
    pub message: String,
}

impl SafetyCheck {
    pub fn passed(
        name: impl Into<String>,
        description: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Passed,
            message: message.into(),
        }
    }

    pub fn failed(
        name: impl Into<String>,
        description: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Failed,
            message: message.into(),
        }
    }

    pub fn warning(
        name: impl Into<String>,
        description: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Warning,
            message: message.into(),
        }
    }
}

/// A fully assessed healing proposal, ready for approval or execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingSuggestion {
    pub action: ActionKind,
    pub description: String,
    pub resource: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Final blended confidence in [0, 1]
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub estimated_impact: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    pub safety_checks: Vec<SafetyCheck>,
    pub requires_approval: bool,
    /// Revision a rollback would restore, when the action is a rollback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_revision: Option<String>,
    /// Replica count a scale would apply, when the action is a scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_replicas: Option<u32>,
}

impl HealingSuggestion {
    pub fn has_failed_check(&self) -> bool {
        self.safety_checks
            .iter()
            .any(|c| c.status == CheckStatus::Failed)
    }
}

/// Outcome of executing one suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ActionKind,
    pub resource: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ActionResult> for ActionRecord {
    fn from(result: &ActionResult) -> Self {
        ActionRecord {
            resource: result.resource,
            action: result.action,
            status: result.status,
            error: result.error.clone(),
            started_at: result.started_at,
            completed_at: result.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_failed_check() {
        let mut suggestion = HealingSuggestion {
            action: ActionKind::Restart,
            description: "Restart deployment".to_string(),
            resource: ResourceKind::Deployment,
            namespace: "prod".to_string(),
            name: "web".to_string(),
            confidence: 0.8,
            risk_level: RiskLevel::Low,
            estimated_impact: "Brief downtime".to_string(),
            prerequisites: Vec::new(),
            steps: Vec::new(),
            alternatives: Vec::new(),
            safety_checks: vec![SafetyCheck::passed(
                "resource-exists",
                "Verify the target resource exists",
                "deployment prod/web found",
            )],
            requires_approval: false,
            rollback_revision: None,
            target_replicas: None,
        };
        assert!(!suggestion.has_failed_check());

        suggestion.safety_checks.push(SafetyCheck::failed(
            "rollback-target",
            "Verify a previous revision exists",
            "no previous revision available",
        ));
        assert!(suggestion.has_failed_check());
    }

    #[test]
    fn test_action_record_from_result() {
        let result = ActionResult {
            action: ActionKind::Scale,
            resource: ResourceKind::Deployment,
            namespace: "prod".to_string(),
            name: "web".to_string(),
            status: ActionStatus::Completed,
            error: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };

        let record = ActionRecord::from(&result);
        assert_eq!(record.action, ActionKind::Scale);
        assert_eq!(record.resource, ResourceKind::Deployment);
        assert!(record.succeeded());
    }

    #[test]
    fn test_risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
