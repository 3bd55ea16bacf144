//! Core domain models shared across the diagnosis and healing pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kinds of cluster resources the pipeline can reason about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Deployment,
    Service,
    Node,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::Node => "node",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of actions a caller can request against a resource
///
/// Only `Rollback`, `Scale`, and `Restart` mutate the cluster; the rest are
/// read-only and exist so the confidence scorer can weight them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Rollback,
    Scale,
    Restart,
    Diagnose,
    Logs,
    Describe,
    Delete,
    Investigate,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Rollback => "rollback",
            ActionKind::Scale => "scale",
            ActionKind::Restart => "restart",
            ActionKind::Diagnose => "diagnose",
            ActionKind::Logs => "logs",
            ActionKind::Describe => "describe",
            ActionKind::Delete => "delete",
            ActionKind::Investigate => "investigate",
        }
    }

    /// Whether executing this action changes cluster state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ActionKind::Rollback | ActionKind::Scale | ActionKind::Restart | ActionKind::Delete
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured request to act on one resource
///
/// Produced by whatever front end interprets the operator (CLI flag parsing,
/// an API route, an intent parser); the pipeline only sees this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub resource: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Free-form parameters, e.g. "replicas" for scale requests
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ActionRequest {
    pub fn new(
        action: ActionKind,
        resource: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource,
            namespace: namespace.into(),
            name: name.into(),
            params: HashMap::new(),
        }
    }

    /// Attach a parameter (builder style)
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }
}

/// Severity of an observed health issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueSeverity::Info => "info",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Classified health issue kinds produced by resource assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    PodStatus,
    ContainerWaiting,
    ContainerTerminated,
    HighRestartCount,
    DeploymentNotAvailable,
    ReplicaMismatch,
    HighRevisionCount,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::PodStatus => "PodStatus",
            IssueKind::ContainerWaiting => "ContainerWaiting",
            IssueKind::ContainerTerminated => "ContainerTerminated",
            IssueKind::HighRestartCount => "HighRestartCount",
            IssueKind::DeploymentNotAvailable => "DeploymentNotAvailable",
            IssueKind::ReplicaMismatch => "ReplicaMismatch",
            IssueKind::HighRevisionCount => "HighRevisionCount",
        };
        f.write_str(s)
    }
}

/// One observed problem on a resource, with remediation guidance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub message: String,
    pub suggestion: String,
}

/// Replica and restart counters attached to a health assessment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStats {
    pub restart_count: u32,
    pub ready_replicas: u32,
    pub total_replicas: u32,
}

/// Point-in-time health assessment of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHealth {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub ready: bool,
    pub message: Option<String>,
    pub issues: Vec<HealthIssue>,
    pub stats: Option<HealthStats>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ResourceHealth {
    /// Count issues at each severity (critical, warning, info)
    pub fn issue_counts(&self) -> (usize, usize, usize) {
        let mut critical = 0;
        let mut warning = 0;
        let mut info = 0;
        for issue in &self.issues {
            match issue.severity {
                IssueSeverity::Critical => critical += 1,
                IssueSeverity::Warning => warning += 1,
                IssueSeverity::Info => info += 1,
            }
        }
        (critical, warning, info)
    }
}
