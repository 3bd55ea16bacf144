//! Raw change data sources
//!
//! `ChangeDataSource` is the seam the history service queries through.
//! `ClusterChangeSource` implements it on top of a cluster accessor, walking
//! namespaces with hard caps so a large cluster cannot stall a query.

use crate::cluster::{ClusterOps, EventFilter, RawEvent};
use crate::error::Result;
use crate::history::types::{
    DeploymentChange, DeploymentChangeKind, NodeChange, NodeChangeKind, TimeWindow,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MAX_NAMESPACES: usize = 50;
const DEFAULT_EVENTS_PER_NAMESPACE: usize = 500;
const DEFAULT_MAX_EVENTS: usize = 1000;

/// Provider of raw change data for one query window
#[async_trait]
pub trait ChangeDataSource: Send + Sync {
    async fn fetch_events(&self, window: TimeWindow) -> Result<Vec<RawEvent>>;
    async fn fetch_deployment_changes(&self, window: TimeWindow) -> Result<Vec<DeploymentChange>>;
    async fn fetch_node_changes(&self, window: TimeWindow) -> Result<Vec<NodeChange>>;
}

/// Caps applied while walking the cluster
#[derive(Debug, Clone)]
pub struct ChangeSourceConfig {
    pub max_namespaces: usize,
    pub events_per_namespace: usize,
    /// Namespace walk stops once more than this many events are collected
    pub max_events: usize,
}

impl Default for ChangeSourceConfig {
    fn default() -> Self {
        Self {
            max_namespaces: DEFAULT_MAX_NAMESPACES,
            events_per_namespace: DEFAULT_EVENTS_PER_NAMESPACE,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

/// Change data source backed by a cluster accessor
pub struct ClusterChangeSource {
    cluster: Arc<dyn ClusterOps>,
    config: ChangeSourceConfig,
}

impl ClusterChangeSource {
    pub fn new(cluster: Arc<dyn ClusterOps>) -> Self {
        Self::with_config(cluster, ChangeSourceConfig::default())
    }

    pub fn with_config(cluster: Arc<dyn ClusterOps>, config: ChangeSourceConfig) -> Self {
        Self { cluster, config }
    }
}

#[async_trait]
impl ChangeDataSource for ClusterChangeSource {
    async fn fetch_events(&self, window: TimeWindow) -> Result<Vec<RawEvent>> {
        let namespaces = self.cluster.list_namespaces().await?;
        let mut all_events = Vec::new();

        for namespace in namespaces.iter().take(self.config.max_namespaces) {
            let events = match self
                .cluster
                .list_events(
                    namespace,
                    &EventFilter::default(),
                    self.config.events_per_namespace,
                )
                .await
            {
                Ok(events) => events,
                // One unreadable namespace must not fail the whole fetch.
                Err(e) => {
                    debug!(
                        event = "namespace_events_skipped",
                        namespace = %namespace,
                        error = %e,
                        "Skipping namespace during event fetch"
                    );
                    continue;
                }
            };

            for event in events {
                if event.event_type != "Warning" {
                    continue;
                }
                match event.effective_time() {
                    Some(t) if window.contains(t) => all_events.push(event),
                    _ => {}
                }
            }

            if all_events.len() > self.config.max_events {
                break;
            }
        }

        Ok(all_events)
    }

    async fn fetch_deployment_changes(&self, window: TimeWindow) -> Result<Vec<DeploymentChange>> {
        let namespaces = self.cluster.list_namespaces().await?;
        let mut changes = Vec::new();

        for namespace in namespaces.iter().take(self.config.max_namespaces) {
            let deployments = match self.cluster.list_deployments(namespace).await {
                Ok(deployments) => deployments,
                Err(e) => {
                    debug!(
                        event = "namespace_deployments_skipped",
                        namespace = %namespace,
                        error = %e,
                        "Skipping namespace during deployment fetch"
                    );
                    continue;
                }
            };

            for deployment in deployments {
                for condition in &deployment.conditions {
                    let timestamp = match condition.last_transition.or(condition.last_update) {
                        Some(t) if window.contains(t) => t,
                        _ => continue,
                    };

                    let mut kind = DeploymentChangeKind::Info;
                    if condition.condition_type == "ReplicaFailure" && condition.status == "True" {
                        kind = DeploymentChangeKind::Failure;
                    } else if condition.condition_type == "Progressing"
                        && condition.status == "False"
                    {
                        kind = DeploymentChangeKind::Rollout;
                    }
                    // An in-flight rollout shadows the condition-derived kind.
                    if deployment
                        .desired_replicas
                        .map(|d| d > deployment.ready_replicas)
                        .unwrap_or(false)
                    {
                        kind = DeploymentChangeKind::Rollout;
                    }

                    changes.push(DeploymentChange {
                        namespace: deployment.namespace.clone(),
                        name: deployment.name.clone(),
                        kind,
                        old_replicas: deployment.replicas,
                        new_replicas: deployment.replicas,
                        old_ready: deployment.ready_replicas,
                        new_ready: deployment.ready_replicas,
                        timestamp,
                        reason: condition.reason.clone().unwrap_or_default(),
                        message: condition.message.clone().unwrap_or_default(),
                    });
                }
            }
        }

        Ok(changes)
    }

    async fn fetch_node_changes(&self, window: TimeWindow) -> Result<Vec<NodeChange>> {
        let nodes = self.cluster.list_nodes().await?;
        let mut changes = Vec::new();

        for node in nodes {
            for condition in &node.conditions {
                let timestamp = match condition.last_transition {
                    Some(t) if window.contains(t) => t,
                    _ => continue,
                };

                let kind = match condition.condition_type.as_str() {
                    "Ready" => {
                        if condition.status == "True" {
                            NodeChangeKind::Ready
                        } else {
                            NodeChangeKind::NotReady
                        }
                    }
                    "MemoryPressure" if condition.status == "True" => {
                        NodeChangeKind::MemoryPressure
                    }
                    "DiskPressure" if condition.status == "True" => NodeChangeKind::DiskPressure,
                    "PIDPressure" if condition.status == "True" => NodeChangeKind::PidPressure,
                    _ => continue,
                };

                changes.push(NodeChange {
                    node_name: node.name.clone(),
                    kind,
                    old_condition: String::new(),
                    new_condition: kind.condition_label().to_string(),
                    timestamp,
                    reason: condition.reason.clone().unwrap_or_default(),
                    message: condition.message.clone().unwrap_or_default(),
                });
            }
        }

        Ok(changes)
    }
}
