//! Normalized change history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open query window `[since, until)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.since && t < self.until
    }
}

/// Severity of a normalized change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSeverity {
    Info,
    Warning,
    Error,
}

/// Which source a normalized change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Event,
    Deployment,
    Node,
}

/// One normalized change, regardless of source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
    /// Empty for cluster-scoped resources
    pub namespace: String,
    pub resource_kind: String,
    pub resource_name: String,
    /// Event reason, or the source-specific change kind string
    pub change_type: String,
    pub severity: ChangeSeverity,
    pub reason: String,
    pub message: String,
    /// Source-specific extras
    pub metadata: serde_json::Value,
}

/// Kind of a detected deployment change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentChangeKind {
    Failure,
    Rollout,
    Info,
}

impl DeploymentChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentChangeKind::Failure => "failure",
            DeploymentChangeKind::Rollout => "rollout",
            DeploymentChangeKind::Info => "info",
        }
    }
}

/// A deployment condition transition observed inside the window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentChange {
    pub namespace: String,
    pub name: String,
    pub kind: DeploymentChangeKind,
    pub old_replicas: u32,
    pub new_replicas: u32,
    pub old_ready: u32,
    pub new_ready: u32,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub message: String,
}

/// Kind of a node condition transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeChangeKind {
    #[serde(rename = "notready")]
    NotReady,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "memory_pressure")]
    MemoryPressure,
    #[serde(rename = "disk_pressure")]
    DiskPressure,
    #[serde(rename = "pid_pressure")]
    PidPressure,
}

impl NodeChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeChangeKind::NotReady => "notready",
            NodeChangeKind::Ready => "ready",
            NodeChangeKind::MemoryPressure => "memory_pressure",
            NodeChangeKind::DiskPressure => "disk_pressure",
            NodeChangeKind::PidPressure => "pid_pressure",
        }
    }

    /// Label of the condition the node entered
    pub fn condition_label(&self) -> &'static str {
        match self {
            NodeChangeKind::NotReady => "NotReady",
            NodeChangeKind::Ready => "Ready",
            NodeChangeKind::MemoryPressure => "MemoryPressure",
            NodeChangeKind::DiskPressure => "DiskPressure",
            NodeChangeKind::PidPressure => "PIDPressure",
        }
    }
}

/// A node condition transition observed inside the window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeChange {
    pub node_name: String,
    pub kind: NodeChangeKind,
    pub old_condition: String,
    pub new_condition: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub message: String,
}

/// Symptom class of an incident candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symptom {
    CrashLoop,
    DeploymentFailure,
    NodeNotReady,
    MemoryPressure,
    DiskPressure,
    #[serde(rename = "PIDPressure")]
    PidPressure,
}

/// A pattern in the change history that looks like an incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentCandidate {
    pub symptom: Symptom,
    /// Workload or node the candidate points at
    pub service: String,
    /// Empty for node incidents
    pub namespace: String,
    pub severity: ChangeSeverity,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub evidence: Vec<String>,
    pub affected_resources: Vec<String>,
    pub count: usize,
}

/// Everything a history query produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQueryResult {
    pub window: TimeWindow,
    pub changes: Vec<ChangeEvent>,
    pub incidents: Vec<IncidentCandidate>,
    pub total_changes: usize,
    pub total_incidents: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
        );

        assert!(window.contains(window.since));
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()));
        assert!(!window.contains(window.until));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 3, 1, 9, 59, 59).unwrap()));
    }

    #[test]
    fn test_symptom_wire_names() {
        assert_eq!(
            serde_json::to_string(&Symptom::PidPressure).unwrap(),
            "\"PIDPressure\""
        );
        assert_eq!(
            serde_json::to_string(&Symptom::CrashLoop).unwrap(),
            "\"CrashLoop\""
        );
    }

    #[test]
    fn test_node_change_kind_labels() {
        assert_eq!(NodeChangeKind::NotReady.as_str(), "notready");
        assert_eq!(NodeChangeKind::NotReady.condition_label(), "NotReady");
        assert_eq!(NodeChangeKind::PidPressure.as_str(), "pid_pressure");
        assert_eq!(NodeChangeKind::PidPressure.condition_label(), "PIDPressure");
    }
}
