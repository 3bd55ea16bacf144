//! Evidence collection for a single workload
//!
//! Gathers pod status, recent events, log tails, and resource metrics in one
//! pass. Pod status is mandatory; every other source degrades gracefully and
//! leaves a note in `Evidence::skipped` instead of failing the collection.

use crate::cluster::{ClusterOps, ContainerState, EventFilter, LogRequest, PodDetail};
use crate::error::{EngineError, Result};
use crate::evidence::types::{
    ContainerMetricsEvidence, Evidence, EventEvidence, LogEvidence, MetricsEvidence,
    PodStatusEvidence, NEAR_LIMIT_PERCENT,
};
use crate::observability::EngineMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

const DEFAULT_LOOKBACK: Duration = Duration::from_secs(3600);
const DEFAULT_TAIL_LINES: i64 = 50;
const DEFAULT_EVENT_LIMIT: usize = 20;
const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Configuration for evidence collection
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// How far back log collection reaches; zero means no time bound
    pub lookback: Duration,
    /// Log lines fetched per container
    pub tail_lines: i64,
    /// Maximum events kept after sorting by recency
    pub event_limit: usize,
    /// Hard deadline for the whole collection pass
    pub deadline: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            tail_lines: DEFAULT_TAIL_LINES,
            event_limit: DEFAULT_EVENT_LIMIT,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

/// Collects diagnostic evidence for one pod through a cluster accessor
pub struct EvidenceCollector {
    cluster: Arc<dyn ClusterOps>,
    config: CollectorConfig,
    metrics: EngineMetrics,
}

impl EvidenceCollector {
    pub fn new(cluster: Arc<dyn ClusterOps>) -> Self {
        Self::with_config(cluster, CollectorConfig::default())
    }

    pub fn with_config(cluster: Arc<dyn ClusterOps>, config: CollectorConfig) -> Self {
        Self {
            cluster,
            config,
            metrics: EngineMetrics::new(),
        }
    }

    /// Collect a complete evidence snapshot for the pod.
    ///
    /// Fails only when the pod itself cannot be fetched or the deadline
    /// expires. Event, log, and metrics failures are recorded in the
    /// snapshot instead.
    pub async fn collect(&self, namespace: &str, pod_name: &str) -> Result<Evidence> {
        let started = Instant::now();
        match timeout(self.config.deadline, self.collect_inner(namespace, pod_name)).await {
            Ok(Ok(evidence)) => {
                self.metrics
                    .observe_evidence_latency(started.elapsed().as_secs_f64());
                debug!(
                    event = "evidence_collected",
                    namespace = %namespace,
                    pod = %pod_name,
                    events = evidence.events.len(),
                    log_containers = evidence.logs.len(),
                    skipped = evidence.skipped.len(),
                    "Evidence collection complete"
                );
                Ok(evidence)
            }
            Ok(Err(e)) => {
                self.metrics.inc_collection_failures();
                Err(e)
            }
            Err(_) => {
                self.metrics.inc_collection_failures();
                warn!(
                    event = "evidence_deadline_exceeded",
                    namespace = %namespace,
                    pod = %pod_name,
                    deadline_secs = self.config.deadline.as_secs(),
                    "Evidence collection timed out"
                );
                Err(EngineError::DeadlineExceeded(self.config.deadline))
            }
        }
    }

    async fn collect_inner(&self, namespace: &str, pod_name: &str) -> Result<Evidence> {
        let pod = self.cluster.get_pod(namespace, pod_name).await?;
        let pod_status = summarize_pod(&pod);
        let mut skipped = Vec::new();

        let events = match self.collect_events(&pod).await {
            Ok(events) => events,
            Err(e) => {
                self.metrics.inc_sources_skipped();
                skipped.push(format!("events unavailable: {}", e));
                Vec::new()
            }
        };

        let logs = self.collect_logs(&pod).await;

        let metrics = match self.collect_metrics(&pod).await {
            Ok(m) => Some(m),
            Err(e) => {
                self.metrics.inc_sources_skipped();
                skipped.push(format!("resource metrics unavailable: {}", e));
                None
            }
        };

        Ok(Evidence {
            pod_status,
            events,
            logs,
            metrics,
            skipped,
        })
    }

    async fn collect_events(&self, pod: &PodDetail) -> Result<Vec<EventEvidence>> {
        let filter = EventFilter {
            involved_uid: Some(pod.uid.clone()),
        };
        // Over-fetch so that sorting by recency happens before the cut.
        let raw = self
            .cluster
            .list_events(&pod.namespace, &filter, self.config.event_limit * 2)
            .await?;

        let mut events: Vec<EventEvidence> = raw
            .into_iter()
            .map(|e| EventEvidence {
                timestamp: e.effective_time(),
                object: format!("{}/{}", e.involved_kind, e.involved_name),
                event_type: e.event_type,
                reason: e.reason,
                message: e.message,
            })
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(self.config.event_limit);
        Ok(events)
    }

    async fn collect_logs(&self, pod: &PodDetail) -> Vec<LogEvidence> {
        let since_seconds = if self.config.lookback.is_zero() {
            None
        } else {
            Some(self.config.lookback.as_secs() as i64)
        };

        let mut logs = Vec::with_capacity(pod.spec_containers.len());
        for container in &pod.spec_containers {
            let request = LogRequest {
                container: container.name.clone(),
                tail_lines: self.config.tail_lines,
                since_seconds,
                previous: false,
            };
            let mut entry = match self
                .cluster
                .fetch_logs(&pod.namespace, &pod.name, &request)
                .await
            {
                Ok(text) => LogEvidence {
                    container: container.name.clone(),
                    lines: split_lines(&text),
                    previous_lines: Vec::new(),
                    error: None,
                },
                Err(e) => LogEvidence {
                    container: container.name.clone(),
                    lines: Vec::new(),
                    previous_lines: Vec::new(),
                    error: Some(e.to_string()),
                },
            };

            let restarted = pod
                .container_statuses
                .iter()
                .any(|s| s.name == container.name && s.restart_count > 0);
            if restarted {
                let previous = LogRequest {
                    previous: true,
                    ..request
                };
                match self
                    .cluster
                    .fetch_logs(&pod.namespace, &pod.name, &previous)
                    .await
                {
                    Ok(text) => entry.previous_lines = split_lines(&text),
                    // The runtime may have dropped the previous instance.
                    Err(e) => debug!(
                        event = "previous_logs_unavailable",
                        container = %container.name,
                        error = %e,
                        "Previous instance logs not available"
                    ),
                }
            }

            logs.push(entry);
        }
        logs
    }

    async fn collect_metrics(&self, pod: &PodDetail) -> Result<MetricsEvidence> {
        let usage = self
            .cluster
            .get_pod_metrics(&pod.namespace, &pod.name)
            .await?;

        let containers = usage
            .into_iter()
            .map(|u| {
                let limit = pod
                    .spec_containers
                    .iter()
                    .find(|c| c.name == u.name)
                    .and_then(|c| c.memory_limit_bytes)
                    .filter(|l| *l > 0);
                let memory_percent =
                    limit.map(|l| (u.memory_bytes as f64 / l as f64) * 100.0);
                ContainerMetricsEvidence {
                    name: u.name,
                    cpu_usage: u.cpu,
                    memory_usage: u.memory,
                    memory_limit: limit.map(format_quantity),
                    memory_percent,
                    near_limit: memory_percent.map(|p| p > NEAR_LIMIT_PERCENT).unwrap_or(false),
                }
            })
            .collect();

        Ok(MetricsEvidence { containers })
    }
}

/// Render a byte count as a binary quantity string
fn format_quantity(bytes: u64) -> String {
    const GI: u64 = 1024 * 1024 * 1024;
    const MI: u64 = 1024 * 1024;
    const KI: u64 = 1024;
    if bytes >= GI && bytes % GI == 0 {
        format!("{}Gi", bytes / GI)
    } else if bytes >= MI {
        format!("{}Mi", bytes / MI)
    } else if bytes >= KI {
        format!("{}Ki", bytes / KI)
    } else {
        format!("{}", bytes)
    }
}

/// Flatten pod detail into the status summary the diagnoser consumes
fn summarize_pod(pod: &PodDetail) -> PodStatusEvidence {
    let restarts = pod
        .container_statuses
        .iter()
        .map(|s| s.restart_count)
        .sum();

    let mut last_termination = None;
    for status in &pod.container_statuses {
        if let Some(ContainerState::Terminated(t)) =
            status.last_state.as_ref()
        {
            last_termination = Some(t.clone());
        }
    }

    PodStatusEvidence {
        phase: pod.phase.clone(),
        reason: pod.reason.clone(),
        restarts,
        last_termination,
        containers: pod.container_statuses.clone(),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}
