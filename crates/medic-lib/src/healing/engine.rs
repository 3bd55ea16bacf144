//! Healing suggestion engine
//!
//! Turns an [`ActionRequest`] into a fully assessed [`HealingSuggestion`]:
//! current health of the target, an action-specific plan, a battery of
//! safety checks, a blended confidence score, and the approval flag
//! execution will enforce.

use crate::cluster::{ClusterError, ClusterOps};
use crate::confidence::{ActionStore, ConfidenceScorer};
use crate::error::{EngineError, Result};
use crate::healing::assess::{assess_deployment, assess_pod};
use crate::healing::types::{CheckStatus, HealingSuggestion, RiskLevel, SafetyCheck};
use crate::models::{ActionKind, ActionRequest, IssueKind, ResourceHealth, ResourceKind};
use crate::observability::{EngineMetrics, StructuredLogger};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Upper bound for each cluster read performed while assessing an action
const DEFAULT_CHECK_DEADLINE: Duration = Duration::from_secs(10);

/// Replica count applied when a scale request names none
pub(crate) const DEFAULT_SCALE_REPLICAS: u32 = 3;

/// Final confidence below which execution needs explicit approval
const APPROVAL_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Configuration for the suggestion engine
#[derive(Debug, Clone)]
pub struct HealingConfig {
    pub check_deadline: Duration,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            check_deadline: DEFAULT_CHECK_DEADLINE,
        }
    }
}

/// Generates assessed healing suggestions for action requests
pub struct HealingEngine {
    cluster: Arc<dyn ClusterOps>,
    scorer: ConfidenceScorer,
    config: HealingConfig,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl HealingEngine {
    pub fn new(cluster: Arc<dyn ClusterOps>, store: Arc<dyn ActionStore>) -> Self {
        Self::with_config(cluster, store, HealingConfig::default())
    }

    pub fn with_config(
        cluster: Arc<dyn ClusterOps>,
        store: Arc<dyn ActionStore>,
        config: HealingConfig,
    ) -> Self {
        Self {
            cluster,
            scorer: ConfidenceScorer::new(store),
            config,
            logger: StructuredLogger::new("default"),
            metrics: EngineMetrics::new(),
        }
    }

    /// Set the cluster context name used in structured log events
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(context);
        self
    }

    /// Produce a fully assessed suggestion for one action request
    pub async fn suggest(&self, request: &ActionRequest) -> Result<HealingSuggestion> {
        debug!(
            event = "suggestion_requested",
            action = %request.action,
            resource = %request.resource,
            namespace = %request.namespace,
            name = %request.name,
            "Generating healing suggestion"
        );

        let health = self.resource_health(request).await?;
        let mut suggestion = self.build_suggestion(request, &health).await?;
        suggestion.safety_checks = self.safety_checks(request, &suggestion).await;

        // The stage estimate feeds the full scorer, which replaces it.
        suggestion.confidence = stage_confidence(&suggestion);
        suggestion.confidence = self.scorer.score(request, Some(&health), &suggestion);
        suggestion.requires_approval = requires_approval(&suggestion);

        self.metrics.inc_suggestions_generated();
        self.logger.log_suggestion(&suggestion);
        if suggestion.requires_approval {
            self.metrics.inc_approvals_required();
            self.logger.log_approval_required(&suggestion);
        }

        Ok(suggestion)
    }

    /// Fetch and assess the health of the request target
    pub async fn resource_health(&self, request: &ActionRequest) -> Result<ResourceHealth> {
        match request.resource {
            ResourceKind::Pod => {
                let pod = self
                    .checked(self.cluster.get_pod(&request.namespace, &request.name))
                    .await?;
                Ok(assess_pod(&pod))
            }
            ResourceKind::Deployment => {
                let deployment = self
                    .checked(self.cluster.get_deployment(&request.namespace, &request.name))
                    .await?;
                Ok(assess_deployment(&deployment))
            }
            _ => Err(EngineError::UnsupportedAction {
                action: request.action,
                resource: request.resource,
            }),
        }
    }

    async fn build_suggestion(
        &self,
        request: &ActionRequest,
        health: &ResourceHealth,
    ) -> Result<HealingSuggestion> {
        let mut suggestion = empty_suggestion(request);
        match request.action {
            ActionKind::Rollback => self.build_rollback(request, &mut suggestion).await?,
            ActionKind::Scale => build_scale(request, &mut suggestion)?,
            ActionKind::Restart => build_restart(request, health, &mut suggestion),
            ActionKind::Diagnose => build_diagnostic(request, health, &mut suggestion),
            _ => build_generic(request, &mut suggestion),
        }
        Ok(suggestion)
    }

    async fn build_rollback(
        &self,
        request: &ActionRequest,
        suggestion: &mut HealingSuggestion,
    ) -> Result<()> {
        if request.resource != ResourceKind::Deployment {
            return Err(EngineError::UnsupportedAction {
                action: ActionKind::Rollback,
                resource: request.resource,
            });
        }

        let revisions = self
            .checked(self.cluster.list_revisions(&request.namespace, &request.name))
            .await?;

        // Most recent revision that is not serving and still had ready replicas.
        let previous = revisions
            .iter()
            .filter(|rev| !rev.is_current && rev.ready_replicas > 0)
            .max_by_key(|rev| revision_number(&rev.revision))
            .ok_or_else(|| EngineError::NoRollbackTarget {
                namespace: request.namespace.clone(),
                name: request.name.clone(),
            })?;

        suggestion.action = ActionKind::Rollback;
        suggestion.description =
            format!("Rollback deployment {} to previous revision", request.name);
        suggestion.risk_level = RiskLevel::Medium;
        suggestion.estimated_impact = "Temporary service disruption during rollout".to_string();
        suggestion.rollback_revision = Some(previous.revision.clone());
        suggestion.steps = vec![
            format!(
                "Rollback deployment {} to revision {}",
                request.name, previous.revision
            ),
            "Monitor rollout progress".to_string(),
            "Verify application health after rollback".to_string(),
        ];
        suggestion.prerequisites = vec![
            "Previous deployment revision exists".to_string(),
            "Application health checks are configured".to_string(),
        ];
        suggestion.alternatives = vec![
            "Fix current deployment issues instead of rolling back".to_string(),
            "Scale down current version and scale up fixed version".to_string(),
        ];
        Ok(())
    }

    async fn safety_checks(
        &self,
        request: &ActionRequest,
        suggestion: &HealingSuggestion,
    ) -> Vec<SafetyCheck> {
        let mut checks = Vec::new();

        checks.push(self.check_resource_exists(request).await);

        // RBAC and cluster-wide health probes are not wired in.
        checks.push(SafetyCheck::passed(
            "Permissions",
            "Check if required permissions are available",
            "Permissions available",
        ));
        checks.push(SafetyCheck::passed(
            "ClusterHealth",
            "Verify cluster is healthy enough for the action",
            "Cluster is healthy",
        ));

        match suggestion.action {
            ActionKind::Rollback => checks.push(self.check_rollback_safety(request).await),
            ActionKind::Scale => checks.push(SafetyCheck::passed(
                "ClusterResources",
                "Verify cluster has sufficient resources",
                "Cluster has sufficient resources for scaling",
            )),
            ActionKind::Restart => {
                if let Some(check) = self.check_restart_safety(request).await {
                    checks.push(check);
                }
            }
            _ => {}
        }

        checks
    }

    async fn check_resource_exists(&self, request: &ActionRequest) -> SafetyCheck {
        let name = "ResourceExists";
        let description = "Verify target resource exists";

        let result = match request.resource {
            ResourceKind::Pod => self
                .checked(self.cluster.get_pod(&request.namespace, &request.name))
                .await
                .map(|_| ()),
            ResourceKind::Deployment => self
                .checked(self.cluster.get_deployment(&request.namespace, &request.name))
                .await
                .map(|_| ()),
            _ => {
                return SafetyCheck::warning(
                    name,
                    description,
                    format!("No existence probe for {} resources", request.resource),
                )
            }
        };

        match result {
            Ok(()) => SafetyCheck::passed(name, description, "Resource found"),
            Err(EngineError::Cluster(err)) if err.is_not_found() => {
                SafetyCheck::failed(name, description, "Resource not found")
            }
            Err(err) => SafetyCheck::warning(
                name,
                description,
                format!("Could not verify resource: {}", err),
            ),
        }
    }

    async fn check_rollback_safety(&self, request: &ActionRequest) -> SafetyCheck {
        let name = "PreviousRevision";
        let description = "Verify previous revision is available";

        match self
            .checked(self.cluster.list_revisions(&request.namespace, &request.name))
            .await
        {
            Ok(revisions) if revisions.len() > 1 => SafetyCheck::passed(
                name,
                description,
                format!("Found {} previous revisions", revisions.len() - 1),
            ),
            _ => SafetyCheck::failed(name, description, "No previous revision found for rollback"),
        }
    }

    async fn check_restart_safety(&self, request: &ActionRequest) -> Option<SafetyCheck> {
        if request.resource != ResourceKind::Deployment {
            return None;
        }

        let name = "HighAvailability";
        let description = "Verify application has high availability";

        let replicas = match self
            .checked(self.cluster.get_deployment(&request.namespace, &request.name))
            .await
        {
            Ok(deployment) => deployment.desired_replicas.unwrap_or(1),
            Err(_) => 0,
        };

        Some(if replicas > 1 {
            SafetyCheck::passed(name, description, "Application has multiple replicas for HA")
        } else {
            SafetyCheck::warning(
                name,
                description,
                "Application has single replica - restart will cause downtime",
            )
        })
    }

    async fn checked<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ClusterError>>,
    {
        match timeout(self.config.check_deadline, operation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::DeadlineExceeded(self.config.check_deadline)),
        }
    }
}

fn empty_suggestion(request: &ActionRequest) -> HealingSuggestion {
    HealingSuggestion {
        action: request.action,
        description: String::new(),
        resource: request.resource,
        namespace: request.namespace.clone(),
        name: request.name.clone(),
        confidence: 0.0,
        risk_level: RiskLevel::Low,
        estimated_impact: String::new(),
        prerequisites: Vec::new(),
        steps: Vec::new(),
        alternatives: Vec::new(),
        safety_checks: Vec::new(),
        requires_approval: false,
        rollback_revision: None,
        target_replicas: None,
    }
}

fn build_scale(request: &ActionRequest, suggestion: &mut HealingSuggestion) -> Result<()> {
    if request.resource != ResourceKind::Deployment {
        return Err(EngineError::UnsupportedAction {
            action: ActionKind::Scale,
            resource: request.resource,
        });
    }

    let target = request
        .param("replicas")
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_SCALE_REPLICAS);

    suggestion.action = ActionKind::Scale;
    suggestion.description = format!("Scale deployment {} to {} replicas", request.name, target);
    suggestion.risk_level = RiskLevel::Low;
    suggestion.estimated_impact = "No service disruption if scaling up".to_string();
    suggestion.target_replicas = Some(target);
    suggestion.steps = vec![
        format!(
            "Update deployment {} replica count to {}",
            request.name, target
        ),
        "Monitor new pod creation and readiness".to_string(),
        "Verify load distribution across pods".to_string(),
    ];
    suggestion.prerequisites = vec![
        "Sufficient cluster resources available".to_string(),
        "Application supports horizontal scaling".to_string(),
    ];
    suggestion.alternatives = vec![
        "Vertical scaling (increase resource limits)".to_string(),
        "Optimize application resource usage".to_string(),
    ];
    Ok(())
}

fn build_restart(
    request: &ActionRequest,
    health: &ResourceHealth,
    suggestion: &mut HealingSuggestion,
) {
    suggestion.action = ActionKind::Restart;
    suggestion.description = format!("Restart {} {}", request.resource, request.name);
    suggestion.risk_level = RiskLevel::Low;
    suggestion.estimated_impact = "Temporary service disruption during restart".to_string();

    let mut reasons: Vec<&str> = Vec::new();
    for issue in &health.issues {
        match issue.kind {
            IssueKind::ContainerWaiting => reasons.push("Container is stuck in waiting state"),
            IssueKind::HighRestartCount => reasons.push("Container has high restart count"),
            IssueKind::PodStatus if health.status != "Running" => {
                reasons.push("Pod is not in running state")
            }
            _ => {}
        }
    }
    if !reasons.is_empty() {
        suggestion.description =
            format!("{} to resolve: {}", suggestion.description, reasons.join(", "));
    }

    suggestion.steps = vec![
        format!("Trigger restart of {} {}", request.resource, request.name),
        "Monitor restart progress and pod readiness".to_string(),
        "Verify application functionality after restart".to_string(),
    ];
    suggestion.prerequisites = vec![
        "Application is designed to handle restarts gracefully".to_string(),
        "Health checks are properly configured".to_string(),
    ];
    suggestion.alternatives = vec![
        "Investigate root cause instead of restarting".to_string(),
        "Scale down and scale up as alternative restart method".to_string(),
    ];
}

fn build_diagnostic(
    request: &ActionRequest,
    health: &ResourceHealth,
    suggestion: &mut HealingSuggestion,
) {
    suggestion.action = ActionKind::Diagnose;
    suggestion.description = format!("Diagnose issues with {} {}", request.resource, request.name);
    suggestion.risk_level = RiskLevel::Low;
    suggestion.estimated_impact = "No impact - diagnostic action only".to_string();

    let mut steps = vec![format!("Check {} status and recent events", request.resource)];
    for issue in &health.issues {
        match issue.kind {
            IssueKind::ContainerWaiting => {
                steps.push("Check container image availability and pull secrets".to_string());
                steps.push("Verify node resources and scheduling constraints".to_string());
            }
            IssueKind::HighRestartCount => {
                steps.push("Analyze application logs for crash patterns".to_string());
                steps.push("Check resource limits and OOM conditions".to_string());
            }
            IssueKind::PodStatus => {
                steps.push("Inspect pod events for scheduling issues".to_string());
                steps.push("Verify node health and connectivity".to_string());
            }
            _ => {}
        }
    }
    steps.push("Review recent changes and deployments".to_string());
    steps.push("Check cluster-wide resource utilization".to_string());
    suggestion.steps = steps;

    suggestion.prerequisites = vec![
        "Access to cluster logs and events".to_string(),
        "Permission to inspect cluster resources".to_string(),
    ];
    suggestion.alternatives = vec![
        "Use automated monitoring tools for diagnosis".to_string(),
        "Consult application-specific documentation".to_string(),
    ];
}

fn build_generic(request: &ActionRequest, suggestion: &mut HealingSuggestion) {
    suggestion.action = ActionKind::Investigate;
    suggestion.description = format!(
        "Investigate {} {} based on user request",
        request.resource, request.name
    );
    suggestion.risk_level = RiskLevel::Low;
    suggestion.estimated_impact = "Depends on specific action taken".to_string();
    suggestion.steps = vec![
        "Analyze current resource state and health".to_string(),
        "Review recent events and logs".to_string(),
        "Identify root cause of any issues".to_string(),
        "Implement appropriate remediation".to_string(),
    ];
}

/// First confidence estimate, before the full scorer runs
fn stage_confidence(suggestion: &HealingSuggestion) -> f64 {
    let mut score: f64 = 0.7;

    if !suggestion.safety_checks.is_empty() {
        let passed = suggestion
            .safety_checks
            .iter()
            .filter(|c| c.status == CheckStatus::Passed)
            .count();
        let ratio = passed as f64 / suggestion.safety_checks.len() as f64;
        score = score * 0.6 + ratio * 0.4;
    }

    score += match suggestion.action {
        ActionKind::Rollback => -0.1,
        ActionKind::Restart => 0.05,
        ActionKind::Scale => 0.1,
        ActionKind::Diagnose => 0.15,
        _ => 0.0,
    };

    score.clamp(0.1, 0.95)
}

fn requires_approval(suggestion: &HealingSuggestion) -> bool {
    if suggestion.risk_level == RiskLevel::High {
        return true;
    }
    if suggestion.confidence < APPROVAL_CONFIDENCE_THRESHOLD {
        return true;
    }
    suggestion.has_failed_check()
}

fn revision_number(revision: &str) -> u64 {
    revision.parse().unwrap_or(0)
}
