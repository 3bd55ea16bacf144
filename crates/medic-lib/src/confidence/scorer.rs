//! Confidence scoring
//!
//! Blends six weighted factors into a single confidence value for a proposed
//! action: current resource health, action complexity, safety check results,
//! historical success of similar actions, data freshness, and cluster state.
//! Per-resource rules put a floor under the final score so that well-known
//! safe actions are never reported as hopeless.

use crate::confidence::history::ActionStore;
use crate::healing::{CheckStatus, HealingSuggestion, RiskLevel, SafetyCheck};
use crate::models::{
    ActionKind, ActionRequest, HealthIssue, IssueKind, ResourceHealth, ResourceKind,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Relative weight of each scoring factor
///
/// The defaults sum to 1.0; callers overriding them should keep that property
/// or the final score loses its [0, 1] meaning.
#[derive(Debug, Clone, Serialize)]
pub struct RiskWeights {
    pub resource_health: f64,
    pub action_complexity: f64,
    pub safety_checks: f64,
    pub historical_success: f64,
    pub data_freshness: f64,
    pub cluster_state: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            resource_health: 0.25,
            action_complexity: 0.20,
            safety_checks: 0.25,
            historical_success: 0.15,
            data_freshness: 0.10,
            cluster_state: 0.05,
        }
    }
}

/// Per-resource scoring rules
///
/// Base complexity weights for known (resource, action) pairs and a minimum
/// the final score is raised to. Unknown pairs fall back to a neutral base.
#[derive(Debug, Clone)]
pub struct ResourceRules {
    action_weights: HashMap<(ResourceKind, ActionKind), f64>,
    min_confidence: HashMap<ResourceKind, f64>,
}

impl Default for ResourceRules {
    fn default() -> Self {
        let mut action_weights = HashMap::new();
        action_weights.insert((ResourceKind::Pod, ActionKind::Restart), 0.85);
        action_weights.insert((ResourceKind::Pod, ActionKind::Logs), 0.95);
        action_weights.insert((ResourceKind::Pod, ActionKind::Describe), 0.90);
        action_weights.insert((ResourceKind::Pod, ActionKind::Delete), 0.60);
        action_weights.insert((ResourceKind::Deployment, ActionKind::Rollback), 0.75);
        action_weights.insert((ResourceKind::Deployment, ActionKind::Scale), 0.85);
        action_weights.insert((ResourceKind::Deployment, ActionKind::Restart), 0.80);
        action_weights.insert((ResourceKind::Deployment, ActionKind::Describe), 0.90);
        action_weights.insert((ResourceKind::Service, ActionKind::Describe), 0.90);
        action_weights.insert((ResourceKind::Service, ActionKind::Delete), 0.50);

        let mut min_confidence = HashMap::new();
        min_confidence.insert(ResourceKind::Pod, 0.5);
        min_confidence.insert(ResourceKind::Deployment, 0.6);
        min_confidence.insert(ResourceKind::Service, 0.5);

        Self {
            action_weights,
            min_confidence,
        }
    }
}

impl ResourceRules {
    fn action_weight(&self, resource: ResourceKind, action: ActionKind) -> Option<f64> {
        self.action_weights.get(&(resource, action)).copied()
    }

    fn min_confidence(&self, resource: ResourceKind) -> Option<f64> {
        self.min_confidence.get(&resource).copied()
    }
}

/// Raw factor scores behind one confidence value
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub resource_health: f64,
    pub action_complexity: f64,
    pub safety_checks: f64,
    pub historical_success: f64,
    pub data_freshness: f64,
    pub cluster_state: f64,
    pub total: f64,
}

/// Scores proposed actions against health, history, and safety signals
pub struct ConfidenceScorer {
    store: Arc<dyn ActionStore>,
    weights: RiskWeights,
    rules: ResourceRules,
}

impl ConfidenceScorer {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self {
            store,
            weights: RiskWeights::default(),
            rules: ResourceRules::default(),
        }
    }

    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_rules(mut self, rules: ResourceRules) -> Self {
        self.rules = rules;
        self
    }

    /// Compute the final confidence for a proposed action
    pub fn score(
        &self,
        request: &ActionRequest,
        health: Option<&ResourceHealth>,
        suggestion: &HealingSuggestion,
    ) -> f64 {
        let breakdown = self.breakdown(request, health, suggestion);
        debug!(
            event = "confidence_scored",
            action = %request.action,
            resource = %request.resource,
            name = %request.name,
            resource_health = breakdown.resource_health,
            action_complexity = breakdown.action_complexity,
            safety_checks = breakdown.safety_checks,
            historical_success = breakdown.historical_success,
            data_freshness = breakdown.data_freshness,
            cluster_state = breakdown.cluster_state,
            total = breakdown.total,
            "confidence computed"
        );
        breakdown.total
    }

    /// Compute all factor scores and the weighted total
    pub fn breakdown(
        &self,
        request: &ActionRequest,
        health: Option<&ResourceHealth>,
        suggestion: &HealingSuggestion,
    ) -> ScoreBreakdown {
        let resource_health = self.resource_score(request, health);
        let action_complexity = self.action_score(request, suggestion);
        let safety_checks = self.safety_score(&suggestion.safety_checks);
        let historical_success = self.historical_score(request);
        let data_freshness = self.freshness_score(health);
        let cluster_state = self.cluster_score();

        let weighted = resource_health * self.weights.resource_health
            + action_complexity * self.weights.action_complexity
            + safety_checks * self.weights.safety_checks
            + historical_success * self.weights.historical_success
            + data_freshness * self.weights.data_freshness
            + cluster_state * self.weights.cluster_state;

        let total = self.apply_floor(request.resource, weighted).clamp(0.0, 1.0);

        ScoreBreakdown {
            resource_health,
            action_complexity,
            safety_checks,
            historical_success,
            data_freshness,
            cluster_state,
            total,
        }
    }

    fn resource_score(&self, request: &ActionRequest, health: Option<&ResourceHealth>) -> f64 {
        let Some(health) = health else {
            // No assessment at all is worse than a known-degraded one.
            return 0.3;
        };

        let mut score: f64 = 0.5;
        if health.ready {
            score += 0.2;
        } else {
            score -= 0.1;
        }

        let (critical, warning, info) = health.issue_counts();
        score -= 0.15 * critical as f64;
        score -= 0.08 * warning as f64;
        score -= 0.03 * info as f64;

        // An action that addresses an observed issue is more plausible than
        // one unrelated to anything seen.
        if !health.issues.is_empty() && action_matches_issues(request.action, &health.issues) {
            score += 0.15;
        }

        score.clamp(0.1, 0.9)
    }

    fn action_score(&self, request: &ActionRequest, suggestion: &HealingSuggestion) -> f64 {
        let mut score = self
            .rules
            .action_weight(request.resource, request.action)
            .unwrap_or(0.6);

        score += match suggestion.risk_level {
            RiskLevel::Low => 0.1,
            RiskLevel::Medium => 0.0,
            RiskLevel::High => -0.2,
        };

        if suggestion.confidence > 0.8 {
            score += 0.05;
        } else if suggestion.confidence < 0.5 {
            score -= 0.1;
        }

        score.clamp(0.1, 0.95)
    }

    fn safety_score(&self, checks: &[SafetyCheck]) -> f64 {
        if checks.is_empty() {
            return 0.5;
        }

        let mut passed = 0.0;
        let mut failed = 0.0;
        let mut warnings = 0.0;
        for check in checks {
            match check.status {
                CheckStatus::Passed => passed += 1.0,
                CheckStatus::Failed => failed += 1.0,
                CheckStatus::Warning => warnings += 1.0,
            }
        }

        let score = passed / checks.len() as f64 - 0.3 * failed - 0.1 * warnings;
        score.clamp(0.0, 1.0)
    }

    fn historical_score(&self, request: &ActionRequest) -> f64 {
        let similar = self.store.similar_actions(request.resource, request.action);
        if similar.is_empty() {
            return 0.5;
        }

        let successes = similar.iter().filter(|r| r.succeeded()).count();
        let overall = successes as f64 / similar.len() as f64;

        let cutoff = Utc::now() - Duration::hours(24);
        let recent: Vec<_> = similar.iter().filter(|r| r.started_at > cutoff).collect();
        if recent.is_empty() {
            return overall;
        }

        let recent_successes = recent.iter().filter(|r| r.succeeded()).count();
        let recent_rate = recent_successes as f64 / recent.len() as f64;

        // Recent outcomes dominate the blend.
        0.3 * overall + 0.7 * recent_rate
    }

    fn freshness_score(&self, health: Option<&ResourceHealth>) -> f64 {
        let checked = match health.and_then(|h| h.last_checked) {
            Some(checked) => checked,
            None => return 0.5,
        };

        let age = Utc::now().signed_duration_since(checked);
        if age < Duration::minutes(5) {
            1.0
        } else if age < Duration::minutes(15) {
            0.8
        } else if age < Duration::minutes(30) {
            0.6
        } else {
            0.3
        }
    }

    fn cluster_score(&self) -> f64 {
        // Cluster-wide pressure signals are not plumbed in; neutral baseline.
        0.7
    }

    fn apply_floor(&self, resource: ResourceKind, score: f64) -> f64 {
        match self.rules.min_confidence(resource) {
            Some(min) if score < min => min,
            _ => score,
        }
    }
}

fn action_matches_issues(action: ActionKind, issues: &[HealthIssue]) -> bool {
    issues.iter().any(|issue| match action {
        ActionKind::Restart => matches!(
            issue.kind,
            IssueKind::ContainerWaiting | IssueKind::HighRestartCount | IssueKind::PodStatus
        ),
        ActionKind::Rollback => matches!(
            issue.kind,
            IssueKind::DeploymentNotAvailable | IssueKind::ReplicaMismatch
        ),
        ActionKind::Scale => {
            issue.kind == IssueKind::ReplicaMismatch
                || issue.message.to_lowercase().contains("replica")
        }
        _ => false,
    })
}
