//! The diagnostic rule chain
//!
//! Rules are ordered from most to least specific. Each check is a pure
//! function over the evidence snapshot.

use super::{Confidence, Diagnosis, Rule};
use crate::cluster::ContainerState;
use crate::evidence::Evidence;
use std::collections::BTreeMap;

/// Restarts above this count are treated as churn
const HIGH_RESTART_THRESHOLD: u32 = 5;
/// Exit code the kernel OOM killer leaves behind
const OOM_EXIT_CODE: i32 = 137;

/// The chain, evaluated in order; the first match wins
pub const RULES: &[Rule] = &[
    Rule {
        name: "oom-killed",
        check: check_oom_killed,
    },
    Rule {
        name: "image-pull",
        check: check_image_pull,
    },
    Rule {
        name: "crash-loop",
        check: check_crash_loop,
    },
    Rule {
        name: "unschedulable",
        check: check_unschedulable,
    },
    Rule {
        name: "container-config",
        check: check_container_config,
    },
    Rule {
        name: "probe-failure",
        check: check_probe_failures,
    },
    Rule {
        name: "restart-churn",
        check: check_high_restarts,
    },
];

fn check_oom_killed(evidence: &Evidence) -> Option<Diagnosis> {
    if let Some(termination) = &evidence.pod_status.last_termination {
        if termination.reason == "OOMKilled" {
            return Some(Diagnosis {
                title: "Container was killed due to out-of-memory (OOMKilled)".to_string(),
                confidence: Confidence::High,
                evidence: vec![
                    format!("Last termination reason: {}", termination.reason),
                    format!("Exit code: {}", termination.exit_code),
                ],
                recommendations: vec![
                    "Increase memory limits for the container".to_string(),
                    "Review application memory usage patterns".to_string(),
                    "Consider adding memory requests to ensure proper scheduling".to_string(),
                ],
            });
        }

        // Exit 137 alone is ambiguous; require corroborating events.
        if termination.exit_code == OOM_EXIT_CODE && evidence.any_event_mentions("oom") {
            return Some(Diagnosis {
                title: "Container was killed due to out-of-memory (OOMKilled)".to_string(),
                confidence: Confidence::High,
                evidence: vec![
                    format!("Exit code: {} (OOM kill signal)", termination.exit_code),
                    "OOM-related events detected".to_string(),
                ],
                recommendations: vec![
                    "Increase memory limits for the container".to_string(),
                    "Review application memory usage patterns".to_string(),
                    "Check if memory metrics show usage near limits".to_string(),
                ],
            });
        }
    }

    if let Some(metrics) = &evidence.metrics {
        for cm in &metrics.containers {
            if cm.near_limit {
                return Some(Diagnosis {
                    title: "Container memory usage near limit (potential OOM risk)".to_string(),
                    confidence: Confidence::Medium,
                    evidence: vec![
                        format!(
                            "Container {} memory usage: {:.1}% of limit",
                            cm.name,
                            cm.memory_percent.unwrap_or(0.0)
                        ),
                        format!(
                            "Memory usage: {} / {}",
                            cm.memory_usage,
                            cm.memory_limit.as_deref().unwrap_or("unknown")
                        ),
                    ],
                    recommendations: vec![
                        "Increase memory limits for the container".to_string(),
                        "Monitor memory usage trends".to_string(),
                        "Review application memory allocation".to_string(),
                    ],
                });
            }
        }
    }

    None
}

fn check_image_pull(evidence: &Evidence) -> Option<Diagnosis> {
    for cs in &evidence.pod_status.containers {
        if let Some(ContainerState::Waiting { reason, message }) = &cs.state {
            if reason == "ImagePullBackOff" || reason == "ErrImagePull" {
                return Some(Diagnosis {
                    title: format!("Container image pull failed: {}", reason),
                    confidence: Confidence::High,
                    evidence: vec![
                        format!("Container {} waiting reason: {}", cs.name, reason),
                        format!("Message: {}", message),
                    ],
                    recommendations: vec![
                        "Verify image name and tag are correct".to_string(),
                        "Check image registry accessibility".to_string(),
                        "Verify image pull secrets are configured correctly".to_string(),
                        "Ensure image exists in the registry".to_string(),
                    ],
                });
            }
        }
    }
    None
}

fn check_crash_loop(evidence: &Evidence) -> Option<Diagnosis> {
    for cs in &evidence.pod_status.containers {
        if cs.state.as_ref().and_then(|s| s.waiting_reason()) != Some("CrashLoopBackOff") {
            continue;
        }

        let mut diagnosis = Diagnosis {
            title: "Container is in CrashLoopBackOff state".to_string(),
            confidence: Confidence::Medium,
            evidence: vec![
                format!("Container {} waiting reason: CrashLoopBackOff", cs.name),
                format!("Restart count: {}", cs.restart_count),
            ],
            recommendations: vec![
                "Check container logs for error messages".to_string(),
                "Review application startup configuration".to_string(),
                "Verify environment variables and secrets".to_string(),
                "Check if the application is crashing on startup".to_string(),
            ],
        };

        // A recorded termination pins down what keeps crashing.
        if let Some(terminated) = cs.last_state.as_ref().and_then(|s| s.as_terminated()) {
            diagnosis.confidence = Confidence::High;
            diagnosis.evidence.push(format!(
                "Last termination reason: {}",
                terminated.reason
            ));
            diagnosis
                .evidence
                .push(format!("Last exit code: {}", terminated.exit_code));
            if let Some(message) = terminated.message.as_deref().filter(|m| !m.is_empty()) {
                diagnosis
                    .evidence
                    .push(format!("Termination message: {}", message));
            }
        }

        return Some(diagnosis);
    }
    None
}

fn check_unschedulable(evidence: &Evidence) -> Option<Diagnosis> {
    if evidence.pod_status.phase != "Pending" {
        return None;
    }

    for ev in &evidence.events {
        if ev.reason == "FailedScheduling" || ev.message.contains("Unschedulable") {
            return Some(Diagnosis {
                title: "Pod is unschedulable".to_string(),
                confidence: Confidence::High,
                evidence: vec![
                    format!("Pod phase: {}", evidence.pod_status.phase),
                    format!("Event reason: {}", ev.reason),
                    format!("Event message: {}", ev.message),
                ],
                recommendations: vec![
                    "Check node resources (CPU, memory, disk)".to_string(),
                    "Verify node selectors and affinity rules".to_string(),
                    "Check for taints and tolerations".to_string(),
                    "Review resource requests and limits".to_string(),
                ],
            });
        }
    }
    None
}

fn check_container_config(evidence: &Evidence) -> Option<Diagnosis> {
    for cs in &evidence.pod_status.containers {
        if let Some(ContainerState::Waiting { reason, message }) = &cs.state {
            if reason == "CreateContainerConfigError" {
                return Some(Diagnosis {
                    title: "Container configuration error".to_string(),
                    confidence: Confidence::High,
                    evidence: vec![
                        format!(
                            "Container {} waiting reason: CreateContainerConfigError",
                            cs.name
                        ),
                        format!("Message: {}", message),
                    ],
                    recommendations: vec![
                        "Check if required secrets or config maps exist".to_string(),
                        "Verify secret/config map keys are correct".to_string(),
                        "Review volume mount configurations".to_string(),
                        "Check environment variable references".to_string(),
                    ],
                });
            }
        }
    }
    None
}

fn check_probe_failures(evidence: &Evidence) -> Option<Diagnosis> {
    let probe_messages: Vec<String> = evidence
        .events
        .iter()
        .filter(|ev| {
            let msg = ev.message.to_lowercase();
            msg.contains("readiness probe failed") || msg.contains("liveness probe failed")
        })
        .map(|ev| ev.message.clone())
        .collect();

    if probe_messages.is_empty() {
        return None;
    }

    Some(Diagnosis {
        title: "Health probe failures detected".to_string(),
        confidence: Confidence::Medium,
        evidence: probe_messages,
        recommendations: vec![
            "Verify probe endpoints are responding correctly".to_string(),
            "Check probe timeout and period settings".to_string(),
            "Review application health check implementation".to_string(),
            "Ensure probe paths are accessible".to_string(),
        ],
    })
}

fn check_high_restarts(evidence: &Evidence) -> Option<Diagnosis> {
    let mut max_restarts = 0u32;
    let mut worst_container = String::new();
    for cs in &evidence.pod_status.containers {
        if cs.restart_count > HIGH_RESTART_THRESHOLD && cs.restart_count > max_restarts {
            max_restarts = cs.restart_count;
            worst_container = cs.name.clone();
        }
    }
    if max_restarts == 0 {
        return None;
    }

    let mut evidence_lines = vec![
        format!(
            "Container {} has restarted {} times",
            worst_container, max_restarts
        ),
        format!("Total pod restarts: {}", evidence.pod_status.restarts),
    ];

    // Ordered map keeps the event summary stable run to run.
    let mut termination_reasons: BTreeMap<&str, u32> = BTreeMap::new();
    for ev in &evidence.events {
        if ev.reason.contains("Killing") || ev.reason.contains("Failed") {
            *termination_reasons.entry(ev.reason.as_str()).or_insert(0) += 1;
        }
    }
    for (reason, count) in &termination_reasons {
        evidence_lines.push(format!("Event: {} (seen {} times)", reason, count));
    }

    let mut confidence = Confidence::Medium;
    if let Some(termination) = &evidence.pod_status.last_termination {
        if !termination.reason.is_empty() {
            evidence_lines.push(format!("Last termination reason: {}", termination.reason));
            confidence = Confidence::High;
        }
        if termination.exit_code != 0 {
            evidence_lines.push(format!("Last exit code: {}", termination.exit_code));
        }
    }

    let mut recommendations = vec![
        "Check container logs for error patterns: kubectl logs <pod-name> -c <container-name>"
            .to_string(),
        "Review recent pod events: kubectl describe pod <pod-name>".to_string(),
        "Check if container is being OOMKilled (exit code 137)".to_string(),
        "Verify application health checks and readiness probes".to_string(),
        "Review resource limits (CPU/memory) - may be too restrictive".to_string(),
        "Check for application startup failures or configuration errors".to_string(),
        "Review environment variables and secrets for misconfigurations".to_string(),
    ];

    if let Some(termination) = &evidence.pod_status.last_termination {
        if termination.reason == "OOMKilled" || termination.exit_code == OOM_EXIT_CODE {
            let mut prepended = vec![
                "Container is being OOMKilled - increase memory limits".to_string(),
                "Review memory usage patterns and optimize application".to_string(),
            ];
            prepended.append(&mut recommendations);
            recommendations = prepended;
        }
        if termination.exit_code != 0 && termination.exit_code != OOM_EXIT_CODE {
            recommendations.insert(
                0,
                format!(
                    "Container exiting with code {} - check application logs for errors",
                    termination.exit_code
                ),
            );
        }
    }

    Some(Diagnosis {
        title: format!("Container has high restart count ({} restarts)", max_restarts),
        confidence,
        evidence: evidence_lines,
        recommendations,
    })
}

/// Fallback when nothing in the chain matched
pub(super) fn unknown_issue(evidence: &Evidence) -> Diagnosis {
    Diagnosis {
        title: "Unknown issue - requires manual investigation".to_string(),
        confidence: Confidence::Low,
        evidence: vec![
            format!("Pod phase: {}", evidence.pod_status.phase),
            format!(
                "Pod reason: {}",
                evidence.pod_status.reason.as_deref().unwrap_or("none")
            ),
        ],
        recommendations: vec![
            "Review pod events for more details".to_string(),
            "Check pod logs for application errors".to_string(),
            "Verify resource limits and requests".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ContainerStatus, TerminationState};
    use crate::evidence::{
        ContainerMetricsEvidence, EventEvidence, MetricsEvidence, PodStatusEvidence,
    };

    fn evidence() -> Evidence {
        Evidence {
            pod_status: PodStatusEvidence {
                phase: "Running".to_string(),
                reason: None,
                restarts: 0,
                last_termination: None,
                containers: vec![],
            },
            events: vec![],
            logs: vec![],
            metrics: None,
            skipped: vec![],
        }
    }

    fn waiting_container(name: &str, reason: &str, message: &str) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            ready: false,
            restart_count: 0,
            state: Some(ContainerState::Waiting {
                reason: reason.to_string(),
                message: message.to_string(),
            }),
            last_state: None,
        }
    }

    fn warning_event(reason: &str, message: &str) -> EventEvidence {
        EventEvidence {
            event_type: "Warning".to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: None,
            object: "Pod/web-0".to_string(),
        }
    }

    #[test]
    fn test_oom_by_termination_reason() {
        let mut ev = evidence();
        ev.pod_status.last_termination = Some(TerminationState {
            reason: "OOMKilled".to_string(),
            exit_code: 137,
            message: None,
            finished_at: None,
        });

        let diag = check_oom_killed(&ev).unwrap();
        assert_eq!(diag.confidence, Confidence::High);
        assert!(diag.evidence.contains(&"Exit code: 137".to_string()));
    }

    #[test]
    fn test_oom_by_exit_code_needs_corroborating_event() {
        let mut ev = evidence();
        ev.pod_status.last_termination = Some(TerminationState {
            reason: "Error".to_string(),
            exit_code: 137,
            message: None,
            finished_at: None,
        });

        // Exit 137 with no OOM event falls through.
        assert!(check_oom_killed(&ev).is_none());

        ev.events.push(warning_event(
            "Killing",
            "Memory cgroup out of memory: killed process",
        ));
        let diag = check_oom_killed(&ev).unwrap();
        assert_eq!(diag.confidence, Confidence::High);
        assert!(diag
            .evidence
            .contains(&"Exit code: 137 (OOM kill signal)".to_string()));
    }

    #[test]
    fn test_oom_near_limit_is_medium() {
        let mut ev = evidence();
        ev.metrics = Some(MetricsEvidence {
            containers: vec![ContainerMetricsEvidence {
                name: "app".to_string(),
                cpu_usage: "100m".to_string(),
                memory_usage: "470Mi".to_string(),
                memory_limit: Some("512Mi".to_string()),
                memory_percent: Some(91.8),
                near_limit: true,
            }],
        });

        let diag = check_oom_killed(&ev).unwrap();
        assert_eq!(
            diag.title,
            "Container memory usage near limit (potential OOM risk)"
        );
        assert_eq!(diag.confidence, Confidence::Medium);
        assert!(diag
            .evidence
            .contains(&"Container app memory usage: 91.8% of limit".to_string()));
        assert!(diag
            .evidence
            .contains(&"Memory usage: 470Mi / 512Mi".to_string()));
    }

    #[test]
    fn test_image_pull_matches_both_reasons() {
        for reason in ["ImagePullBackOff", "ErrImagePull"] {
            let mut ev = evidence();
            ev.pod_status.containers = vec![waiting_container(
                "app",
                reason,
                "Failed to pull image \"registry/app:broken\"",
            )];

            let diag = check_image_pull(&ev).unwrap();
            assert_eq!(diag.title, format!("Container image pull failed: {}", reason));
            assert_eq!(diag.confidence, Confidence::High);
        }
    }

    #[test]
    fn test_crash_loop_upgraded_by_termination_record() {
        let mut ev = evidence();
        let mut container =
            waiting_container("app", "CrashLoopBackOff", "back-off 5m0s restarting");
        container.restart_count = 6;
        ev.pod_status.containers = vec![container];

        let diag = check_crash_loop(&ev).unwrap();
        assert_eq!(diag.confidence, Confidence::Medium);
        assert!(diag.evidence.contains(&"Restart count: 6".to_string()));

        let mut container =
            waiting_container("app", "CrashLoopBackOff", "back-off 5m0s restarting");
        container.restart_count = 6;
        container.last_state = Some(ContainerState::Terminated(TerminationState {
            reason: "Error".to_string(),
            exit_code: 1,
            message: Some("panic: connection refused".to_string()),
            finished_at: None,
        }));
        ev.pod_status.containers = vec![container];

        let diag = check_crash_loop(&ev).unwrap();
        assert_eq!(diag.confidence, Confidence::High);
        assert!(diag
            .evidence
            .contains(&"Termination message: panic: connection refused".to_string()));
    }

    #[test]
    fn test_unschedulable_requires_pending_phase() {
        let mut ev = evidence();
        ev.events.push(warning_event(
            "FailedScheduling",
            "0/5 nodes are available: 5 Insufficient cpu",
        ));
        assert!(check_unschedulable(&ev).is_none());

        ev.pod_status.phase = "Pending".to_string();
        let diag = check_unschedulable(&ev).unwrap();
        assert_eq!(diag.title, "Pod is unschedulable");
        assert!(diag
            .evidence
            .contains(&"Event reason: FailedScheduling".to_string()));
    }

    #[test]
    fn test_container_config_error() {
        let mut ev = evidence();
        ev.pod_status.containers = vec![waiting_container(
            "app",
            "CreateContainerConfigError",
            "secret \"db-credentials\" not found",
        )];

        let diag = check_container_config(&ev).unwrap();
        assert_eq!(diag.title, "Container configuration error");
        assert!(diag
            .evidence
            .contains(&"Message: secret \"db-credentials\" not found".to_string()));
    }

    #[test]
    fn test_probe_failures_collect_messages() {
        let mut ev = evidence();
        ev.events.push(warning_event(
            "Unhealthy",
            "Readiness probe failed: HTTP probe failed with statuscode: 503",
        ));
        ev.events.push(warning_event(
            "Unhealthy",
            "Liveness probe failed: Get \"http://10.0.0.4:8080/healthz\": context deadline exceeded",
        ));
        ev.events.push(warning_event("BackOff", "unrelated"));

        let diag = check_probe_failures(&ev).unwrap();
        assert_eq!(diag.title, "Health probe failures detected");
        assert_eq!(diag.evidence.len(), 2);
    }

    #[test]
    fn test_high_restarts_below_threshold_ignored() {
        let mut ev = evidence();
        let mut container = waiting_container("app", "CrashLoopBackOff", "");
        container.restart_count = 5;
        ev.pod_status.containers = vec![container];

        assert!(check_high_restarts(&ev).is_none());
    }

    #[test]
    fn test_high_restarts_summarizes_events_deterministically() {
        let mut ev = evidence();
        ev.pod_status.restarts = 14;
        ev.pod_status.containers = vec![
            ContainerStatus {
                name: "app".to_string(),
                ready: false,
                restart_count: 9,
                state: None,
                last_state: None,
            },
            ContainerStatus {
                name: "sidecar".to_string(),
                ready: true,
                restart_count: 5,
                state: None,
                last_state: None,
            },
        ];
        ev.events.push(warning_event("Killing", "Stopping container app"));
        ev.events.push(warning_event("Killing", "Stopping container app"));
        ev.events.push(warning_event("FailedMount", "timed out"));

        let diag = check_high_restarts(&ev).unwrap();
        assert_eq!(diag.title, "Container has high restart count (9 restarts)");
        assert_eq!(diag.confidence, Confidence::Medium);
        assert!(diag
            .evidence
            .contains(&"Container app has restarted 9 times".to_string()));
        assert!(diag
            .evidence
            .contains(&"Event: FailedMount (seen 1 times)".to_string()));
        assert!(diag
            .evidence
            .contains(&"Event: Killing (seen 2 times)".to_string()));
    }

    #[test]
    fn test_high_restarts_oom_advice_prepended() {
        let mut ev = evidence();
        ev.pod_status.restarts = 8;
        ev.pod_status.containers = vec![ContainerStatus {
            name: "app".to_string(),
            ready: false,
            restart_count: 8,
            state: None,
            last_state: None,
        }];
        ev.pod_status.last_termination = Some(TerminationState {
            reason: "OOMKilled".to_string(),
            exit_code: 137,
            message: None,
            finished_at: None,
        });

        let diag = check_high_restarts(&ev).unwrap();
        assert_eq!(diag.confidence, Confidence::High);
        assert_eq!(
            diag.recommendations[0],
            "Container is being OOMKilled - increase memory limits"
        );
    }

    #[test]
    fn test_high_restarts_nonzero_exit_advice_first() {
        let mut ev = evidence();
        ev.pod_status.restarts = 7;
        ev.pod_status.containers = vec![ContainerStatus {
            name: "app".to_string(),
            ready: false,
            restart_count: 7,
            state: None,
            last_state: None,
        }];
        ev.pod_status.last_termination = Some(TerminationState {
            reason: "Error".to_string(),
            exit_code: 2,
            message: None,
            finished_at: None,
        });

        let diag = check_high_restarts(&ev).unwrap();
        assert_eq!(
            diag.recommendations[0],
            "Container exiting with code 2 - check application logs for errors"
        );
    }

    #[test]
    fn test_unknown_issue_reports_phase_and_reason() {
        let mut ev = evidence();
        ev.pod_status.phase = "Failed".to_string();
        ev.pod_status.reason = Some("Evicted".to_string());

        let diag = unknown_issue(&ev);
        assert_eq!(diag.confidence, Confidence::Low);
        assert!(diag.evidence.contains(&"Pod phase: Failed".to_string()));
        assert!(diag.evidence.contains(&"Pod reason: Evicted".to_string()));
    }
}
