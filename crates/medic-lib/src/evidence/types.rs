//! Evidence data model
//!
//! A point-in-time snapshot of everything observable about one workload.
//! Only the pod status is guaranteed present; the remaining sources are
//! best-effort and report their own gaps.

use crate::cluster::{ContainerStatus, TerminationState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory usage percentage above which a container is flagged near its limit
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

/// Complete evidence snapshot for one pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub pod_status: PodStatusEvidence,
    /// Most recent first, bounded by the collector's event limit
    pub events: Vec<EventEvidence>,
    pub logs: Vec<LogEvidence>,
    /// `None` when the metrics source was unavailable (see `skipped`)
    pub metrics: Option<MetricsEvidence>,
    /// Human-readable reasons a source could not be collected
    pub skipped: Vec<String>,
}

/// Aggregated pod status derived from the accessor's pod detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodStatusEvidence {
    pub phase: String,
    pub reason: Option<String>,
    /// Restart count summed across all containers
    pub restarts: u32,
    /// Termination record of the last container that has one
    pub last_termination: Option<TerminationState>,
    pub containers: Vec<ContainerStatus>,
}

/// One cluster event attributed to the pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEvidence {
    /// "Normal" or "Warning"
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// "Kind/name" of the involved object
    pub object: String,
}

/// Tail of one container's logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvidence {
    pub container: String,
    pub lines: Vec<String>,
    /// Logs of the previous instance, when the container restarted and the
    /// runtime still had them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_lines: Vec<String>,
    /// Set when fetching this container's logs failed
    pub error: Option<String>,
}

/// Resource usage snapshot from the metrics API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEvidence {
    pub containers: Vec<ContainerMetricsEvidence>,
}

/// Usage for one container, with limit proximity when a limit is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerMetricsEvidence {
    pub name: String,
    pub cpu_usage: String,
    pub memory_usage: String,
    /// Memory limit as a quantity string; `None` when the spec sets no limit
    pub memory_limit: Option<String>,
    /// Percentage of the memory limit in use; `None` without a limit
    pub memory_percent: Option<f64>,
    pub near_limit: bool,
}

impl Evidence {
    /// Whether any event's message or reason contains the needle
    /// (case-insensitive)
    pub fn any_event_mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.events.iter().any(|e| {
            e.message.to_lowercase().contains(&needle) || e.reason.to_lowercase().contains(&needle)
        })
    }

    /// Whether any container metric is flagged near its memory limit
    pub fn any_container_near_memory_limit(&self) -> bool {
        self.metrics
            .as_ref()
            .map(|m| m.containers.iter().any(|c| c.near_limit))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence_with_events(events: Vec<EventEvidence>) -> Evidence {
        Evidence {
            pod_status: PodStatusEvidence {
                phase: "Running".to_string(),
                reason: None,
                restarts: 0,
                last_termination: None,
                containers: vec![],
            },
            events,
            logs: vec![],
            metrics: None,
            skipped: vec![],
        }
    }

    #[test]
    fn test_any_event_mentions_is_case_insensitive() {
        let evidence = evidence_with_events(vec![EventEvidence {
            event_type: "Warning".to_string(),
            reason: "Killing".to_string(),
            message: "Memory cgroup out of memory: OOM victim selected".to_string(),
            timestamp: None,
            object: "Pod/web-0".to_string(),
        }]);

        assert!(evidence.any_event_mentions("oom"));
        assert!(evidence.any_event_mentions("KILLING"));
        assert!(!evidence.any_event_mentions("unschedulable"));
    }

    #[test]
    fn test_near_limit_lookup() {
        let mut evidence = evidence_with_events(vec![]);
        assert!(!evidence.any_container_near_memory_limit());

        evidence.metrics = Some(MetricsEvidence {
            containers: vec![ContainerMetricsEvidence {
                name: "app".to_string(),
                cpu_usage: "250m".to_string(),
                memory_usage: "490Mi".to_string(),
                memory_limit: Some("512Mi".to_string()),
                memory_percent: Some(95.7),
                near_limit: true,
            }],
        });
        assert!(evidence.any_container_near_memory_limit());
    }

    #[test]
    fn test_log_evidence_serialization_omits_empty_previous() {
        let log = LogEvidence {
            container: "app".to_string(),
            lines: vec!["panic: oom".to_string()],
            previous_lines: vec![],
            error: None,
        };
        let json = serde_json::to_string(&log).unwrap();
        assert!(!json.contains("previous_lines"));
    }
}
