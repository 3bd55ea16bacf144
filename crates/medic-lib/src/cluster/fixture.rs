//! In-memory cluster fixture
//!
//! A [`ClusterOps`] backend populated from builder calls or a captured JSON
//! snapshot. Used by the test suite and for offline triage of snapshots
//! taken from a live cluster. Supports failure injection per capability
//! (event-listing denial, metrics unavailability, per-container log errors,
//! mutation failures) and records every mutation for later inspection.

use super::{
    async_trait, ClusterError, ClusterOps, ContainerUsage, DeploymentDetail, EventFilter,
    LogRequest, NodeDetail, PodDetail, RawEvent, ReplicaSetRevision,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// A mutation performed against the fixture, recorded for assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Restart {
        namespace: String,
        name: String,
    },
    Scale {
        namespace: String,
        name: String,
        replicas: u32,
    },
    Rollback {
        namespace: String,
        name: String,
        revision: String,
    },
}

/// Serializable capture of one container's logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogCapture {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    #[serde(default)]
    pub previous: bool,
    pub lines: String,
}

/// Serializable capture of one pod's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsCapture {
    pub namespace: String,
    pub pod: String,
    pub containers: Vec<ContainerUsage>,
}

/// Serializable capture of one deployment's rollout history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionCapture {
    pub namespace: String,
    pub deployment: String,
    pub entries: Vec<ReplicaSetRevision>,
}

/// On-disk snapshot format consumed by [`FixtureCluster::from_snapshot`]
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub pods: Vec<PodDetail>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub deployments: Vec<DeploymentDetail>,
    #[serde(default)]
    pub nodes: Vec<NodeDetail>,
    #[serde(default)]
    pub logs: Vec<LogCapture>,
    #[serde(default)]
    pub metrics: Vec<MetricsCapture>,
    #[serde(default)]
    pub revisions: Vec<RevisionCapture>,
}

/// In-memory [`ClusterOps`] implementation
#[derive(Debug)]
pub struct FixtureCluster {
    namespaces: Vec<String>,
    pods: Vec<PodDetail>,
    events: Vec<RawEvent>,
    deployments: Vec<DeploymentDetail>,
    nodes: Vec<NodeDetail>,
    /// (namespace, pod, container, previous) -> raw log text
    logs: HashMap<(String, String, String, bool), String>,
    /// (namespace, pod, container) -> injected fetch error
    log_errors: HashMap<(String, String, String), String>,
    /// (namespace, pod) -> per-container usage
    metrics: HashMap<(String, String), Vec<ContainerUsage>>,
    /// (namespace, deployment) -> rollout history
    revisions: HashMap<(String, String), Vec<ReplicaSetRevision>>,
    deny_events: Option<String>,
    metrics_unavailable: Option<String>,
    fail_nodes: Option<String>,
    fail_mutations: Option<String>,
    mutations: Mutex<Vec<Mutation>>,
}

impl Default for FixtureCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureCluster {
    pub fn new() -> Self {
        Self {
            namespaces: Vec::new(),
            pods: Vec::new(),
            events: Vec::new(),
            deployments: Vec::new(),
            nodes: Vec::new(),
            logs: HashMap::new(),
            log_errors: HashMap::new(),
            metrics: HashMap::new(),
            revisions: HashMap::new(),
            deny_events: None,
            metrics_unavailable: None,
            fail_nodes: None,
            fail_mutations: None,
            mutations: Mutex::new(Vec::new()),
        }
    }

    /// Build a fixture from a snapshot value
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Self {
        let mut fixture = Self::new();
        for ns in snapshot.namespaces {
            fixture = fixture.with_namespace(ns);
        }
        for pod in snapshot.pods {
            fixture = fixture.with_pod(pod);
        }
        for event in snapshot.events {
            fixture = fixture.with_event(event);
        }
        for deployment in snapshot.deployments {
            fixture = fixture.with_deployment(deployment);
        }
        for node in snapshot.nodes {
            fixture = fixture.with_node(node);
        }
        for log in snapshot.logs {
            fixture.logs.insert(
                (log.namespace, log.pod, log.container, log.previous),
                log.lines,
            );
        }
        for capture in snapshot.metrics {
            fixture
                .metrics
                .insert((capture.namespace, capture.pod), capture.containers);
        }
        for capture in snapshot.revisions {
            fixture
                .revisions
                .insert((capture.namespace, capture.deployment), capture.entries);
        }
        fixture
    }

    /// Load a fixture from a snapshot file captured earlier
    pub fn from_snapshot_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file {:?}", path))?;
        let snapshot: ClusterSnapshot =
            serde_json::from_str(&data).context("Failed to parse cluster snapshot")?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        if !self.namespaces.contains(&namespace) {
            self.namespaces.push(namespace);
        }
        self
    }

    pub fn with_pod(mut self, pod: PodDetail) -> Self {
        self = self.with_namespace(pod.namespace.clone());
        self.pods.push(pod);
        self
    }

    pub fn with_event(mut self, event: RawEvent) -> Self {
        self = self.with_namespace(event.namespace.clone());
        self.events.push(event);
        self
    }

    pub fn with_deployment(mut self, deployment: DeploymentDetail) -> Self {
        self = self.with_namespace(deployment.namespace.clone());
        self.deployments.push(deployment);
        self
    }

    pub fn with_node(mut self, node: NodeDetail) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_log(
        mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        lines: impl Into<String>,
    ) -> Self {
        self.logs.insert(
            (
                namespace.to_string(),
                pod.to_string(),
                container.to_string(),
                false,
            ),
            lines.into(),
        );
        self
    }

    pub fn with_previous_log(
        mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        lines: impl Into<String>,
    ) -> Self {
        self.logs.insert(
            (
                namespace.to_string(),
                pod.to_string(),
                container.to_string(),
                true,
            ),
            lines.into(),
        );
        self
    }

    /// Make current-instance log fetches for one container fail
    pub fn with_log_error(
        mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        message: impl Into<String>,
    ) -> Self {
        self.log_errors.insert(
            (
                namespace.to_string(),
                pod.to_string(),
                container.to_string(),
            ),
            message.into(),
        );
        self
    }

    pub fn with_metrics(
        mut self,
        namespace: &str,
        pod: &str,
        containers: Vec<ContainerUsage>,
    ) -> Self {
        self.metrics
            .insert((namespace.to_string(), pod.to_string()), containers);
        self
    }

    pub fn with_revisions(
        mut self,
        namespace: &str,
        deployment: &str,
        entries: Vec<ReplicaSetRevision>,
    ) -> Self {
        self.revisions
            .insert((namespace.to_string(), deployment.to_string()), entries);
        self
    }

    /// All event listing fails with a permission error
    pub fn deny_events(mut self, message: impl Into<String>) -> Self {
        self.deny_events = Some(message.into());
        self
    }

    /// The metrics API is unavailable
    pub fn without_metrics(mut self, message: impl Into<String>) -> Self {
        self.metrics_unavailable = Some(message.into());
        self
    }

    /// Node listing fails, which makes the node fetch branch a hard error
    pub fn fail_nodes(mut self, message: impl Into<String>) -> Self {
        self.fail_nodes = Some(message.into());
        self
    }

    /// All mutating calls fail
    pub fn fail_mutations(mut self, message: impl Into<String>) -> Self {
        self.fail_mutations = Some(message.into());
        self
    }

    /// Mutations recorded so far, in execution order
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    fn record(&self, mutation: Mutation) {
        self.mutations.lock().unwrap().push(mutation);
    }

    fn deployment_exists(&self, namespace: &str, name: &str) -> bool {
        self.deployments
            .iter()
            .any(|d| d.namespace == namespace && d.name == name)
    }

    fn check_mutation(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        if let Some(ref message) = self.fail_mutations {
            return Err(ClusterError::Api(message.clone()));
        }
        if !self.deployment_exists(namespace, name) {
            return Err(ClusterError::not_found("deployment", namespace, name));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterOps for FixtureCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodDetail, ClusterError> {
        self.pods
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("pod", namespace, name))
    }

    async fn list_events(
        &self,
        namespace: &str,
        filter: &EventFilter,
        limit: usize,
    ) -> Result<Vec<RawEvent>, ClusterError> {
        if let Some(ref message) = self.deny_events {
            return Err(ClusterError::PermissionDenied(message.clone()));
        }
        let mut events: Vec<RawEvent> = self
            .events
            .iter()
            .filter(|e| e.namespace == namespace)
            .filter(|e| match &filter.involved_uid {
                Some(uid) => e.involved_uid.as_deref() == Some(uid.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        events.truncate(limit);
        Ok(events)
    }

    async fn fetch_logs(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<String, ClusterError> {
        let key = (
            namespace.to_string(),
            pod.to_string(),
            request.container.clone(),
        );
        if request.previous {
            return self
                .logs
                .get(&(key.0, key.1, key.2, true))
                .cloned()
                .ok_or_else(|| {
                    ClusterError::Unavailable("previous instance logs not retained".to_string())
                });
        }
        if let Some(message) = self.log_errors.get(&key) {
            return Err(ClusterError::Api(message.clone()));
        }
        Ok(self
            .logs
            .get(&(key.0, key.1, key.2, false))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_pod_metrics(
        &self,
        namespace: &str,
        pod: &str,
    ) -> Result<Vec<ContainerUsage>, ClusterError> {
        if let Some(ref message) = self.metrics_unavailable {
            return Err(ClusterError::Unavailable(message.clone()));
        }
        self.metrics
            .get(&(namespace.to_string(), pod.to_string()))
            .cloned()
            .ok_or_else(|| {
                ClusterError::Unavailable(format!("no metrics reported for {}/{}", namespace, pod))
            })
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.namespaces.clone())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeploymentDetail, ClusterError> {
        self.deployments
            .iter()
            .find(|d| d.namespace == namespace && d.name == name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("deployment", namespace, name))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentDetail>, ClusterError> {
        Ok(self
            .deployments
            .iter()
            .filter(|d| d.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeDetail>, ClusterError> {
        if let Some(ref message) = self.fail_nodes {
            return Err(ClusterError::Unreachable(message.clone()));
        }
        Ok(self.nodes.clone())
    }

    async fn list_revisions(
        &self,
        namespace: &str,
        deployment: &str,
    ) -> Result<Vec<ReplicaSetRevision>, ClusterError> {
        Ok(self
            .revisions
            .get(&(namespace.to_string(), deployment.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn restart_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.check_mutation(namespace, name)?;
        self.record(Mutation::Restart {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        self.check_mutation(namespace, name)?;
        self.record(Mutation::Scale {
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas,
        });
        Ok(())
    }

    async fn rollback_deployment(
        &self,
        namespace: &str,
        name: &str,
        revision: &str,
    ) -> Result<(), ClusterError> {
        self.check_mutation(namespace, name)?;
        self.record(Mutation::Rollback {
            namespace: namespace.to_string(),
            name: name.to_string(),
            revision: revision.to_string(),
        });
        Ok(())
    }
}
