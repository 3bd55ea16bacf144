//! Resource health assessment
//!
//! Turns raw pod and deployment detail into a [`ResourceHealth`] with
//! classified issues. The suggestion engine feeds these into the confidence
//! scorer and uses the issue kinds to tailor its output.

use crate::cluster::{ContainerState, DeploymentDetail, PodDetail};
use crate::models::{HealthIssue, HealthStats, IssueKind, IssueSeverity, ResourceHealth};
use chrono::Utc;

/// Total restarts across containers above which a warning is raised
const RESTART_WARNING_THRESHOLD: u32 = 5;

/// Observed generation above which frequent updates are flagged
const HIGH_REVISION_THRESHOLD: i64 = 10;

/// Assess the health of one pod from its current status
pub fn assess_pod(pod: &PodDetail) -> ResourceHealth {
    let mut health = ResourceHealth {
        name: pod.name.clone(),
        namespace: pod.namespace.clone(),
        status: pod.phase.clone(),
        ready: false,
        message: None,
        issues: Vec::new(),
        stats: None,
        last_checked: Some(Utc::now()),
    };

    // A pod outside Running needs event and log inspection before any
    // container-level detail is meaningful.
    if pod.phase != "Running" {
        health.issues.push(HealthIssue {
            kind: IssueKind::PodStatus,
            severity: IssueSeverity::Critical,
            message: format!("Pod is in {} phase", pod.phase),
            suggestion: "Check pod events and logs for issues".to_string(),
        });
        return health;
    }

    let total = pod.container_statuses.len();
    let mut ready = 0usize;
    let mut restarts: u32 = 0;

    for status in &pod.container_statuses {
        if status.ready {
            ready += 1;
        }
        restarts += status.restart_count;

        if let Some(ContainerState::Waiting { reason, .. }) = &status.state {
            health.issues.push(HealthIssue {
                kind: IssueKind::ContainerWaiting,
                severity: IssueSeverity::Warning,
                message: format!("Container {} is waiting: {}", status.name, reason),
                suggestion: waiting_suggestion(reason).to_string(),
            });
        }

        if let Some(terminated) = status.state.as_ref().and_then(|s| s.as_terminated()) {
            let severity = if terminated.exit_code != 0 {
                IssueSeverity::Critical
            } else {
                IssueSeverity::Warning
            };
            health.issues.push(HealthIssue {
                kind: IssueKind::ContainerTerminated,
                severity,
                message: format!(
                    "Container {} terminated with exit code {}: {}",
                    status.name, terminated.exit_code, terminated.reason
                ),
                suggestion: "Check container logs for error details".to_string(),
            });
        }
    }

    if ready == total {
        health.ready = true;
        health.message = Some("All containers are ready".to_string());
    } else {
        health.message = Some(format!("{}/{} containers are ready", ready, total));
    }

    if restarts > RESTART_WARNING_THRESHOLD {
        health.issues.push(HealthIssue {
            kind: IssueKind::HighRestartCount,
            severity: IssueSeverity::Warning,
            message: format!("Container has restarted {} times", restarts),
            suggestion: "Investigate application logs for crash reasons".to_string(),
        });
    }

    health.stats = Some(HealthStats {
        restart_count: restarts,
        ..HealthStats::default()
    });

    health
}

/// Assess the health of one deployment from its current status
pub fn assess_deployment(deployment: &DeploymentDetail) -> ResourceHealth {
    let mut health = ResourceHealth {
        name: deployment.name.clone(),
        namespace: deployment.namespace.clone(),
        status: "Unknown".to_string(),
        ready: false,
        message: None,
        issues: Vec::new(),
        stats: None,
        last_checked: Some(Utc::now()),
    };

    let available = deployment
        .conditions
        .iter()
        .any(|c| c.condition_type == "Available" && c.status == "True");

    if !available {
        health.status = "Not Available".to_string();
        health.issues.push(HealthIssue {
            kind: IssueKind::DeploymentNotAvailable,
            severity: IssueSeverity::Critical,
            message: "Deployment is not available".to_string(),
            suggestion: "Check pod status and events for issues".to_string(),
        });
        return health;
    }

    // Unset spec replicas default to 1 server-side.
    let desired = deployment.desired_replicas.unwrap_or(1);
    let ready = deployment.ready_replicas;

    health.stats = Some(HealthStats {
        restart_count: 0,
        ready_replicas: ready,
        total_replicas: desired,
    });

    if ready == desired {
        health.ready = true;
        health.status = "Healthy".to_string();
        health.message = Some(format!("All {} replicas are ready", desired));
    } else {
        health.status = "Degraded".to_string();
        health.message = Some(format!("{}/{} replicas are ready", ready, desired));
        health.issues.push(HealthIssue {
            kind: IssueKind::ReplicaMismatch,
            severity: IssueSeverity::Warning,
            message: format!("Only {} out of {} replicas are ready", ready, desired),
            suggestion: "Check pod status and events for deployment issues".to_string(),
        });
    }

    if deployment.observed_generation > HIGH_REVISION_THRESHOLD {
        health.issues.push(HealthIssue {
            kind: IssueKind::HighRevisionCount,
            severity: IssueSeverity::Info,
            message: format!("Deployment has {} revisions", deployment.observed_generation),
            suggestion: "Consider cleaning up old replica sets".to_string(),
        });
    }

    health
}

fn waiting_suggestion(reason: &str) -> &'static str {
    match reason.to_lowercase().as_str() {
        "crashloopbackoff" => "Application is crashing repeatedly. Check logs for errors.",
        "imagepullbackoff" | "errimagepull" => {
            "Cannot pull container image. Check image name and registry access."
        }
        "containercreating" => "Container is being created. Wait a moment and check again.",
        "pending" => "Pod is pending. Check node resources and scheduling constraints.",
        _ => "Check container events for more details.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ContainerStatus, DeploymentCondition, TerminationState};

    fn container(name: &str, ready: bool, restarts: u32, state: ContainerState) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            ready,
            restart_count: restarts,
            state: Some(state),
            last_state: None,
        }
    }

    fn running() -> ContainerState {
        ContainerState::Running { started_at: None }
    }

    fn pod(phase: &str, containers: Vec<ContainerStatus>) -> PodDetail {
        PodDetail {
            name: "web-0".to_string(),
            namespace: "prod".to_string(),
            uid: "uid-1".to_string(),
            phase: phase.to_string(),
            reason: None,
            created_at: None,
            spec_containers: Vec::new(),
            container_statuses: containers,
        }
    }

    fn deployment(desired: u32, ready: u32, available: bool) -> DeploymentDetail {
        let condition = DeploymentCondition {
            condition_type: "Available".to_string(),
            status: if available { "True" } else { "False" }.to_string(),
            reason: None,
            message: None,
            last_transition: None,
            last_update: None,
        };
        DeploymentDetail {
            name: "web".to_string(),
            namespace: "prod".to_string(),
            desired_replicas: Some(desired),
            replicas: desired,
            ready_replicas: ready,
            observed_generation: 2,
            created_at: None,
            conditions: vec![condition],
        }
    }

    #[test]
    fn test_non_running_pod_is_critical() {
        let health = assess_pod(&pod("Pending", vec![container("app", false, 0, running())]));

        assert!(!health.ready);
        assert_eq!(health.status, "Pending");
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].kind, IssueKind::PodStatus);
        assert_eq!(health.issues[0].message, "Pod is in Pending phase");
        assert!(health.message.is_none());
        assert!(health.stats.is_none());
    }

    #[test]
    fn test_waiting_container_maps_suggestion() {
        let waiting = ContainerState::Waiting {
            reason: "CrashLoopBackOff".to_string(),
            message: "back-off 5m0s restarting failed container".to_string(),
        };
        let health = assess_pod(&pod("Running", vec![container("app", false, 3, waiting)]));

        let issue = &health.issues[0];
        assert_eq!(issue.kind, IssueKind::ContainerWaiting);
        assert_eq!(issue.message, "Container app is waiting: CrashLoopBackOff");
        assert_eq!(
            issue.suggestion,
            "Application is crashing repeatedly. Check logs for errors."
        );
        assert_eq!(health.message.as_deref(), Some("0/1 containers are ready"));
    }

    #[test]
    fn test_image_pull_suggestion_is_case_insensitive() {
        assert_eq!(
            waiting_suggestion("ErrImagePull"),
            "Cannot pull container image. Check image name and registry access."
        );
        assert_eq!(
            waiting_suggestion("SomethingNew"),
            "Check container events for more details."
        );
    }

    #[test]
    fn test_terminated_severity_follows_exit_code() {
        let clean = ContainerState::Terminated(TerminationState {
            reason: "Completed".to_string(),
            exit_code: 0,
            message: None,
            finished_at: None,
        });
        let health = assess_pod(&pod("Running", vec![container("job", true, 0, clean)]));
        assert_eq!(health.issues[0].severity, IssueSeverity::Warning);

        let oom = ContainerState::Terminated(TerminationState {
            reason: "OOMKilled".to_string(),
            exit_code: 137,
            message: None,
            finished_at: None,
        });
        let health = assess_pod(&pod("Running", vec![container("app", false, 2, oom)]));
        assert_eq!(health.issues[0].severity, IssueSeverity::Critical);
        assert_eq!(
            health.issues[0].message,
            "Container app terminated with exit code 137: OOMKilled"
        );
    }

    #[test]
    fn test_restart_total_summed_across_containers() {
        let health = assess_pod(&pod(
            "Running",
            vec![
                container("app", true, 3, running()),
                container("sidecar", true, 3, running()),
            ],
        ));

        assert!(health.ready);
        assert_eq!(health.message.as_deref(), Some("All containers are ready"));
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].kind, IssueKind::HighRestartCount);
        assert_eq!(health.issues[0].message, "Container has restarted 6 times");
        assert_eq!(health.stats.as_ref().unwrap().restart_count, 6);
    }

    #[test]
    fn test_restart_total_at_threshold_not_flagged() {
        let health = assess_pod(&pod("Running", vec![container("app", true, 5, running())]));
        assert!(health.issues.is_empty());
    }

    #[test]
    fn test_unavailable_deployment_stops_early() {
        let health = assess_deployment(&deployment(3, 0, false));

        assert!(!health.ready);
        assert_eq!(health.status, "Not Available");
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].kind, IssueKind::DeploymentNotAvailable);
        assert!(health.stats.is_none());
    }

    #[test]
    fn test_degraded_deployment_reports_replica_mismatch() {
        let health = assess_deployment(&deployment(3, 2, true));

        assert!(!health.ready);
        assert_eq!(health.status, "Degraded");
        assert_eq!(health.message.as_deref(), Some("2/3 replicas are ready"));
        assert_eq!(health.issues[0].kind, IssueKind::ReplicaMismatch);
        assert_eq!(
            health.issues[0].message,
            "Only 2 out of 3 replicas are ready"
        );
        let stats = health.stats.unwrap();
        assert_eq!(stats.ready_replicas, 2);
        assert_eq!(stats.total_replicas, 3);
    }

    #[test]
    fn test_healthy_deployment_flags_high_revision_count() {
        let mut d = deployment(3, 3, true);
        d.observed_generation = 14;
        let health = assess_deployment(&d);

        assert!(health.ready);
        assert_eq!(health.status, "Healthy");
        assert_eq!(health.message.as_deref(), Some("All 3 replicas are ready"));
        assert_eq!(health.issues.len(), 1);
        assert_eq!(health.issues[0].kind, IssueKind::HighRevisionCount);
        assert_eq!(health.issues[0].severity, IssueSeverity::Info);
        assert_eq!(health.issues[0].message, "Deployment has 14 revisions");
    }
}
