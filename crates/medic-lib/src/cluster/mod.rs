//! Cluster accessor boundary
//!
//! The pipeline never talks to a Kubernetes API server directly; it consumes
//! the narrow read/mutate surface defined here. Any backend works: a live
//! API-backed client, a caching proxy, or the in-memory [`FixtureCluster`]
//! used by the test suite and for offline triage of captured snapshots.

mod fixture;

pub use fixture::{
    ClusterSnapshot, FixtureCluster, LogCapture, MetricsCapture, Mutation, RevisionCapture,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use async_trait::async_trait;

/// Failures at the cluster accessor boundary
///
/// The pipeline branches on these: `NotFound` on the primary resource aborts
/// evidence collection, while `PermissionDenied` on events or `Unavailable`
/// on metrics downgrade to a skipped-source note.
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    #[error("api error: {0}")]
    Api(String),
}

impl ClusterError {
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        ClusterError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// The state a container is currently (or was last) in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Waiting {
        reason: String,
        message: String,
    },
    Running {
        started_at: Option<DateTime<Utc>>,
    },
    Terminated(TerminationState),
}

impl ContainerState {
    /// Waiting-state reason, if this is a waiting state
    pub fn waiting_reason(&self) -> Option<&str> {
        match self {
            ContainerState::Waiting { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn as_terminated(&self) -> Option<&TerminationState> {
        match self {
            ContainerState::Terminated(t) => Some(t),
            _ => None,
        }
    }
}

/// Details of a container termination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationState {
    /// Termination reason, empty when the runtime reported none
    #[serde(default)]
    pub reason: String,
    pub exit_code: i32,
    pub message: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Live status of one container inside a pod
///
/// Both states are optional; the kubelet may not have reported either yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub ready: bool,
    pub restart_count: u32,
    pub state: Option<ContainerState>,
    pub last_state: Option<ContainerState>,
}

/// A container named in the pod spec, with its memory limit when one is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecContainer {
    pub name: String,
    pub memory_limit_bytes: Option<u64>,
}

/// Pod detail as returned by the accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub phase: String,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub spec_containers: Vec<SpecContainer>,
    pub container_statuses: Vec<ContainerStatus>,
}

/// A raw cluster event (unnormalized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub namespace: String,
    /// "Normal" or "Warning"
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub involved_kind: String,
    pub involved_name: String,
    pub involved_uid: Option<String>,
    pub component: Option<String>,
    pub count: u32,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl RawEvent {
    /// Best event time: last occurrence, falling back to first
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp.or(self.first_timestamp)
    }
}

/// Server-side event filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to events whose involved object has this UID
    pub involved_uid: Option<String>,
}

/// Parameters for a log fetch
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub container: String,
    pub tail_lines: i64,
    pub since_seconds: Option<i64>,
    /// Fetch the previous container instance's logs instead of the current one
    pub previous: bool,
}

/// Resource usage reported for one container by the metrics API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    /// CPU usage as a quantity string, e.g. "250m"
    pub cpu: String,
    /// Memory usage as a quantity string, e.g. "128Mi"
    pub memory: String,
    pub memory_bytes: u64,
}

/// One status condition on a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentCondition {
    pub condition_type: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Deployment detail as returned by the accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDetail {
    pub name: String,
    pub namespace: String,
    pub desired_replicas: Option<u32>,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub observed_generation: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub conditions: Vec<DeploymentCondition>,
}

/// One status condition on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCondition {
    pub condition_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition: Option<DateTime<Utc>>,
}

/// Node detail as returned by the accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetail {
    pub name: String,
    pub conditions: Vec<NodeCondition>,
}

/// One entry in a deployment's rollout history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSetRevision {
    pub revision: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub is_current: bool,
}

/// Narrow read/mutate capability surface the pipeline consumes
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Fetch one pod; `NotFound` here is a hard error for callers
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodDetail, ClusterError>;

    /// List events in a namespace, newest not guaranteed first
    async fn list_events(
        &self,
        namespace: &str,
        filter: &EventFilter,
        limit: usize,
    ) -> Result<Vec<RawEvent>, ClusterError>;

    /// Fetch container logs as text
    async fn fetch_logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<String, ClusterError>;

    /// Per-container usage from the metrics API (optional capability)
    async fn get_pod_metrics(
        &self,
        namespace: &str,
        pod: &str,
    ) -> Result<Vec<ContainerUsage>, ClusterError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeploymentDetail, ClusterError>;

    async fn list_deployments(&self, namespace: &str)
        -> Result<Vec<DeploymentDetail>, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<NodeDetail>, ClusterError>;

    /// Rollout history of a deployment, one entry per replica set revision
    async fn list_revisions(
        &self,
        namespace: &str,
        deployment: &str,
    ) -> Result<Vec<ReplicaSetRevision>, ClusterError>;

    /// Trigger a rolling restart of a deployment
    async fn restart_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> Result<(), ClusterError>;

    async fn rollback_deployment(
        &self,
        namespace: &str,
        name: &str,
        revision: &str,
    ) -> Result<(), ClusterError>;
}
