//! History query service
//!
//! Runs the three raw fetches concurrently, normalizes everything into one
//! change list, and mines the raw data for incident candidates. Any branch
//! failure aborts the whole query so callers never see a silently partial
//! timeline.

use crate::cluster::{ClusterOps, RawEvent};
use crate::error::{EngineError, Result};
use crate::history::source::{ChangeDataSource, ClusterChangeSource};
use crate::history::types::{
    ChangeEvent, ChangeKind, ChangeSeverity, DeploymentChange, DeploymentChangeKind,
    HistoryQueryResult, IncidentCandidate, NodeChange, NodeChangeKind, Symptom, TimeWindow,
};
use crate::observability::EngineMetrics;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Event reason fragments that mark a pod as crash looping
const CRASH_LOOP_REASONS: &[&str] = &["CrashLoopBackOff", "Error", "Failed", "BackOff"];

/// Normalized view over cluster change history
pub struct HistoryService {
    source: Arc<dyn ChangeDataSource>,
    metrics: EngineMetrics,
}

impl HistoryService {
    pub fn new(source: Arc<dyn ChangeDataSource>) -> Self {
        Self {
            source,
            metrics: EngineMetrics::new(),
        }
    }

    /// Convenience constructor wiring the default cluster-backed source
    pub fn from_cluster(cluster: Arc<dyn ClusterOps>) -> Self {
        Self::new(Arc::new(ClusterChangeSource::new(cluster)))
    }

    /// Query the window. All three fetches run concurrently; the query fails
    /// as a whole if any branch fails.
    pub async fn query(&self, window: TimeWindow) -> Result<HistoryQueryResult> {
        let started = Instant::now();

        let events_task = {
            let source = Arc::clone(&self.source);
            tokio::spawn(async move { source.fetch_events(window).await })
        };
        let deployments_task = {
            let source = Arc::clone(&self.source);
            tokio::spawn(async move { source.fetch_deployment_changes(window).await })
        };
        let nodes_task = {
            let source = Arc::clone(&self.source);
            tokio::spawn(async move { source.fetch_node_changes(window).await })
        };

        // Join everything before looking at errors, so no branch is left
        // running detached when one fails.
        let (events_join, deployments_join, nodes_join) =
            tokio::join!(events_task, deployments_task, nodes_task);
        let events = flatten_branch("events", events_join)?;
        let deployment_changes = flatten_branch("deployment changes", deployments_join)?;
        let node_changes = flatten_branch("node changes", nodes_join)?;

        let changes = normalize(&events, &deployment_changes, &node_changes);
        let incidents = identify_incidents(&events, &deployment_changes, &node_changes);

        self.metrics
            .observe_history_latency(started.elapsed().as_secs_f64());
        self.metrics.add_incidents_identified(incidents.len() as u64);
        info!(
            event = "history_query",
            since = %window.since,
            until = %window.until,
            changes = changes.len(),
            incidents = incidents.len(),
            "History query complete"
        );

        Ok(HistoryQueryResult {
            window,
            total_changes: changes.len(),
            total_incidents: incidents.len(),
            changes,
            incidents,
        })
    }
}

fn flatten_branch<T>(
    branch: &'static str,
    joined: std::result::Result<Result<Vec<T>>, tokio::task::JoinError>,
) -> Result<Vec<T>> {
    match joined {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(EngineError::fetch_failed(branch, e)),
        Err(e) => Err(EngineError::FetchTask {
            branch,
            message: e.to_string(),
        }),
    }
}

/// Fold the three raw streams into one normalized change list,
/// events first, then deployments, then nodes.
fn normalize(
    events: &[RawEvent],
    deployment_changes: &[DeploymentChange],
    node_changes: &[NodeChange],
) -> Vec<ChangeEvent> {
    let mut changes = Vec::with_capacity(
        events.len() + deployment_changes.len() + node_changes.len(),
    );

    for event in events {
        let severity = if event.event_type == "Warning" {
            ChangeSeverity::Warning
        } else {
            ChangeSeverity::Info
        };
        changes.push(ChangeEvent {
            kind: ChangeKind::Event,
            timestamp: event.effective_time().unwrap_or_else(Utc::now),
            namespace: event.namespace.clone(),
            resource_kind: event.involved_kind.clone(),
            resource_name: event.involved_name.clone(),
            change_type: event.reason.clone(),
            severity,
            reason: event.reason.clone(),
            message: event.message.clone(),
            metadata: json!({
                "count": event.count,
                "component": event.component,
            }),
        });
    }

    for change in deployment_changes {
        let severity = match change.kind {
            DeploymentChangeKind::Failure => ChangeSeverity::Error,
            DeploymentChangeKind::Rollout => ChangeSeverity::Warning,
            DeploymentChangeKind::Info => ChangeSeverity::Info,
        };
        changes.push(ChangeEvent {
            kind: ChangeKind::Deployment,
            timestamp: change.timestamp,
            namespace: change.namespace.clone(),
            resource_kind: "Deployment".to_string(),
            resource_name: change.name.clone(),
            change_type: change.kind.as_str().to_string(),
            severity,
            reason: change.reason.clone(),
            message: change.message.clone(),
            metadata: json!({
                "old_replicas": change.old_replicas,
                "new_replicas": change.new_replicas,
                "old_ready": change.old_ready,
                "new_ready": change.new_ready,
            }),
        });
    }

    for change in node_changes {
        let severity = match change.kind {
            NodeChangeKind::NotReady
            | NodeChangeKind::MemoryPressure
            | NodeChangeKind::DiskPressure => ChangeSeverity::Error,
            NodeChangeKind::Ready | NodeChangeKind::PidPressure => ChangeSeverity::Warning,
        };
        changes.push(ChangeEvent {
            kind: ChangeKind::Node,
            timestamp: change.timestamp,
            // Nodes are cluster-scoped.
            namespace: String::new(),
            resource_kind: "Node".to_string(),
            resource_name: change.node_name.clone(),
            change_type: change.kind.as_str().to_string(),
            severity,
            reason: change.reason.clone(),
            message: change.message.clone(),
            metadata: json!({
                "old_condition": change.old_condition,
                "new_condition": change.new_condition,
            }),
        });
    }

    changes
}

/// Mine the raw data for incident candidates
fn identify_incidents(
    events: &[RawEvent],
    deployment_changes: &[DeploymentChange],
    node_changes: &[NodeChange],
) -> Vec<IncidentCandidate> {
    let mut incidents = Vec::new();

    // Group events by involved object; ordered map keeps output stable.
    let mut event_groups: BTreeMap<(String, String, String), Vec<&RawEvent>> = BTreeMap::new();
    for event in events {
        event_groups
            .entry((
                event.namespace.clone(),
                event.involved_kind.clone(),
                event.involved_name.clone(),
            ))
            .or_default()
            .push(event);
    }

    for ((namespace, kind, name), group) in &event_groups {
        match kind.as_str() {
            "Pod" => {
                let mut evidence = Vec::new();
                let mut timestamps = Vec::new();
                for event in group {
                    let matches = CRASH_LOOP_REASONS
                        .iter()
                        .any(|reason| event.reason.contains(reason));
                    if matches {
                        evidence.push(format!("{}: {}", event.reason, event.message));
                        if let Some(t) = event.effective_time() {
                            timestamps.push(t);
                        }
                    }
                }

                if !evidence.is_empty() {
                    incidents.push(IncidentCandidate {
                        symptom: Symptom::CrashLoop,
                        service: infer_service_from_pod(name),
                        namespace: namespace.clone(),
                        severity: ChangeSeverity::Error,
                        first_seen: min_time(&timestamps),
                        last_seen: max_time(&timestamps),
                        count: evidence.len(),
                        evidence,
                        affected_resources: vec![format!("{}/{}", namespace, name)],
                    });
                }
            }
            "Deployment" => {
                let mut evidence = Vec::new();
                let mut timestamps = Vec::new();
                for event in group {
                    if event.reason.contains("Failed") || event.reason.contains("Error") {
                        evidence.push(format!("{}: {}", event.reason, event.message));
                        if let Some(t) = event.effective_time() {
                            timestamps.push(t);
                        }
                    }
                }

                if !evidence.is_empty() {
                    incidents.push(IncidentCandidate {
                        symptom: Symptom::DeploymentFailure,
                        service: name.clone(),
                        namespace: namespace.clone(),
                        severity: ChangeSeverity::Error,
                        first_seen: min_time(&timestamps),
                        last_seen: max_time(&timestamps),
                        count: evidence.len(),
                        evidence,
                        affected_resources: vec![format!("{}/{}", namespace, name)],
                    });
                }
            }
            _ => {}
        }
    }

    // Fold node changes into one candidate per node. The first change fixes
    // the symptom and severity; later ones widen the window and count.
    let mut node_issues: BTreeMap<String, IncidentCandidate> = BTreeMap::new();
    for change in node_changes {
        let (symptom, severity) = match change.kind {
            NodeChangeKind::NotReady => (Symptom::NodeNotReady, ChangeSeverity::Error),
            NodeChangeKind::MemoryPressure => (Symptom::MemoryPressure, ChangeSeverity::Error),
            NodeChangeKind::DiskPressure => (Symptom::DiskPressure, ChangeSeverity::Error),
            NodeChangeKind::PidPressure => (Symptom::PidPressure, ChangeSeverity::Warning),
            NodeChangeKind::Ready => continue,
        };

        let evidence_line = format!("{}: {}", change.reason, change.message);
        node_issues
            .entry(change.node_name.clone())
            .and_modify(|incident| {
                incident.count += 1;
                incident.first_seen = incident.first_seen.min(change.timestamp);
                incident.last_seen = incident.last_seen.max(change.timestamp);
                incident.evidence.push(evidence_line.clone());
            })
            .or_insert_with(|| IncidentCandidate {
                symptom,
                service: change.node_name.clone(),
                namespace: String::new(),
                severity,
                first_seen: change.timestamp,
                last_seen: change.timestamp,
                evidence: vec![evidence_line],
                affected_resources: vec![change.node_name.clone()],
                count: 1,
            });
    }
    incidents.extend(node_issues.into_values());

    for change in deployment_changes {
        if change.kind == DeploymentChangeKind::Failure {
            incidents.push(IncidentCandidate {
                symptom: Symptom::DeploymentFailure,
                service: change.name.clone(),
                namespace: change.namespace.clone(),
                severity: ChangeSeverity::Error,
                first_seen: change.timestamp,
                last_seen: change.timestamp,
                evidence: vec![change.message.clone()],
                affected_resources: vec![format!("{}/{}", change.namespace, change.name)],
                count: 1,
            });
        }
    }

    incidents
}

/// Pod names usually end in generated suffixes; strip the last segment
fn infer_service_from_pod(pod_name: &str) -> String {
    match pod_name.rsplit_once('-') {
        Some((prefix, _)) => prefix.to_string(),
        None => pod_name.to_string(),
    }
}

fn min_time(times: &[DateTime<Utc>]) -> DateTime<Utc> {
    times.iter().min().copied().unwrap_or_else(Utc::now)
}

fn max_time(times: &[DateTime<Utc>]) -> DateTime<Utc> {
    times.iter().max().copied().unwrap_or_else(Utc::now)
}
