//! End-to-end pipeline tests against the in-memory cluster fixture.
//!
//! Each test drives the public API the way an embedding product would:
//! collect evidence and diagnose, mine history and correlate, then suggest
//! and execute healing actions with the approval gate in place.

use chrono::{DateTime, TimeZone, Utc};
use medic_lib::cluster::{
    ContainerState, ContainerStatus, ContainerUsage, DeploymentCondition, DeploymentDetail,
    FixtureCluster, Mutation, NodeCondition, NodeDetail, PodDetail, RawEvent, ReplicaSetRevision,
    SpecContainer, TerminationState,
};
use medic_lib::confidence::{ActionHistory, ActionRecord, ActionStatus, ActionStore};
use medic_lib::correlate::{ChangeCorrelator, IncidentRef, Relationship};
use medic_lib::diagnose::{diagnose, Confidence};
use medic_lib::evidence::EvidenceCollector;
use medic_lib::healing::{ActionExecutor, HealingEngine};
use medic_lib::history::{HistoryService, Symptom, TimeWindow};
use medic_lib::{ActionKind, ActionRequest, EngineError, ResourceKind};
use std::sync::Arc;
use std::time::Duration;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
}

fn oom_pod(namespace: &str, name: &str) -> PodDetail {
    PodDetail {
        name: name.to_string(),
        namespace: namespace.to_string(),
        uid: format!("uid-{}", name),
        phase: "Running".to_string(),
        reason: None,
        created_at: Some(at(9, 0)),
        spec_containers: vec![SpecContainer {
            name: "app".to_string(),
            memory_limit_bytes: Some(512 * 1024 * 1024),
        }],
        container_statuses: vec![ContainerStatus {
            name: "app".to_string(),
            ready: false,
            restart_count: 3,
            state: Some(ContainerState::Waiting {
                reason: "CrashLoopBackOff".to_string(),
                message: "back-off 2m40s restarting failed container".to_string(),
            }),
            last_state: Some(ContainerState::Terminated(TerminationState {
                reason: "OOMKilled".to_string(),
                exit_code: 137,
                message: None,
                finished_at: Some(at(10, 28)),
            })),
        }],
    }
}

fn pod_event(pod: &PodDetail, reason: &str, message: &str, timestamp: DateTime<Utc>) -> RawEvent {
    RawEvent {
        namespace: pod.namespace.clone(),
        event_type: "Warning".to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        involved_kind: "Pod".to_string(),
        involved_name: pod.name.clone(),
        involved_uid: Some(pod.uid.clone()),
        component: Some("kubelet".to_string()),
        count: 1,
        first_timestamp: None,
        last_timestamp: Some(timestamp),
    }
}

fn warning_event(
    namespace: &str,
    pod_name: &str,
    reason: &str,
    timestamp: DateTime<Utc>,
) -> RawEvent {
    RawEvent {
        namespace: namespace.to_string(),
        event_type: "Warning".to_string(),
        reason: reason.to_string(),
        message: format!("{} observed for {}", reason, pod_name),
        involved_kind: "Pod".to_string(),
        involved_name: pod_name.to_string(),
        involved_uid: Some(format!("uid-{}", pod_name)),
        component: Some("kubelet".to_string()),
        count: 1,
        first_timestamp: None,
        last_timestamp: Some(timestamp),
    }
}

fn available_deployment(namespace: &str, name: &str, desired: u32, ready: u32) -> DeploymentDetail {
    DeploymentDetail {
        name: name.to_string(),
        namespace: namespace.to_string(),
        desired_replicas: Some(desired),
        replicas: desired,
        ready_replicas: ready,
        observed_generation: 2,
        created_at: None,
        conditions: vec![DeploymentCondition {
            condition_type: "Available".to_string(),
            status: "True".to_string(),
            reason: None,
            message: None,
            last_transition: None,
            last_update: None,
        }],
    }
}

fn revision(rev: &str, current: bool, ready: u32) -> ReplicaSetRevision {
    ReplicaSetRevision {
        revision: rev.to_string(),
        name: format!("checkout-{}", rev),
        created_at: None,
        replicas: 3,
        ready_replicas: ready,
        is_current: current,
    }
}

#[tokio::test]
async fn test_oom_kill_diagnosed_from_collected_evidence() {
    let pod = oom_pod("prod", "payments-api-7d9fb");
    let cluster = FixtureCluster::new()
        .with_event(pod_event(
            &pod,
            "Killing",
            "Stopping container app",
            at(10, 25),
        ))
        .with_event(pod_event(
            &pod,
            "BackOff",
            "Back-off restarting failed container",
            at(10, 30),
        ))
        .with_pod(pod)
        .with_log("prod", "payments-api-7d9fb", "app", "listening on :8080\n")
        .with_previous_log(
            "prod",
            "payments-api-7d9fb",
            "app",
            "fatal error: runtime: out of memory\n",
        )
        .with_metrics(
            "prod",
            "payments-api-7d9fb",
            vec![ContainerUsage {
                name: "app".to_string(),
                cpu: "150m".to_string(),
                memory: "500Mi".to_string(),
                memory_bytes: 500 * 1024 * 1024,
            }],
        );

    let collector = EvidenceCollector::new(Arc::new(cluster));
    let evidence = collector.collect("prod", "payments-api-7d9fb").await.unwrap();

    assert_eq!(evidence.pod_status.phase, "Running");
    assert_eq!(evidence.pod_status.restarts, 3);
    let termination = evidence.pod_status.last_termination.as_ref().unwrap();
    assert_eq!(termination.reason, "OOMKilled");
    assert_eq!(termination.exit_code, 137);
    assert_eq!(evidence.events[0].reason, "BackOff");
    assert_eq!(
        evidence.logs[0].previous_lines,
        vec!["fatal error: runtime: out of memory"]
    );
    assert!(evidence.metrics.as_ref().unwrap().containers[0].near_limit);
    assert!(evidence.skipped.is_empty());

    let diagnosis = diagnose(&evidence);
    assert_eq!(
        diagnosis.title,
        "Container was killed due to out-of-memory (OOMKilled)"
    );
    assert_eq!(diagnosis.confidence, Confidence::High);
    assert!(diagnosis
        .evidence
        .contains(&"Last termination reason: OOMKilled".to_string()));
}

#[tokio::test]
async fn test_diagnosis_survives_denied_sources() {
    let pod = oom_pod("prod", "payments-api-7d9fb");
    let cluster = FixtureCluster::new()
        .with_pod(pod)
        .deny_events("events is forbidden")
        .without_metrics("metrics API not available");

    let collector = EvidenceCollector::new(Arc::new(cluster));
    let evidence = collector.collect("prod", "payments-api-7d9fb").await.unwrap();

    assert_eq!(evidence.skipped.len(), 2);
    assert!(evidence
        .skipped
        .iter()
        .any(|s| s.starts_with("events unavailable:")));
    assert!(evidence
        .skipped
        .iter()
        .any(|s| s.starts_with("resource metrics unavailable:")));

    // The termination record alone carries the diagnosis.
    let diagnosis = diagnose(&evidence);
    assert_eq!(
        diagnosis.title,
        "Container was killed due to out-of-memory (OOMKilled)"
    );
    assert_eq!(diagnosis.confidence, Confidence::High);
}

#[tokio::test]
async fn test_history_incident_correlates_with_deployment_failure() {
    let failing_deployment = DeploymentDetail {
        name: "payments-api".to_string(),
        namespace: "prod".to_string(),
        desired_replicas: Some(3),
        replicas: 3,
        ready_replicas: 3,
        observed_generation: 4,
        created_at: None,
        conditions: vec![DeploymentCondition {
            condition_type: "ReplicaFailure".to_string(),
            status: "True".to_string(),
            reason: Some("FailedCreate".to_string()),
            message: Some("pods \"payments-api-\" is forbidden".to_string()),
            last_transition: Some(at(10, 12)),
            last_update: None,
        }],
    };
    let cluster = Arc::new(
        FixtureCluster::new()
            .with_event(warning_event("prod", "payments-api-abc12", "BackOff", at(10, 15)))
            .with_event(warning_event(
                "prod",
                "payments-api-abc12",
                "CrashLoopBackOff",
                at(10, 20),
            ))
            .with_deployment(failing_deployment),
    );

    let history = Arc::new(HistoryService::from_cluster(Arc::clone(&cluster) as _));
    let result = history
        .query(TimeWindow::new(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    assert_eq!(result.total_changes, 3);
    assert_eq!(result.total_incidents, 2);
    let crash = &result.incidents[0];
    assert_eq!(crash.symptom, Symptom::CrashLoop);
    assert_eq!(crash.service, "payments-api");
    assert_eq!(crash.count, 2);
    assert_eq!(crash.first_seen, at(10, 15));
    assert_eq!(result.incidents[1].symptom, Symptom::DeploymentFailure);

    let incident = IncidentRef::from(crash);
    let correlator = ChangeCorrelator::new(history);
    let correlation = correlator.correlate(&incident, Duration::ZERO).await.unwrap();

    assert_eq!(correlation.total_changes, 3);
    assert_eq!(correlation.high_relevance, 1);
    assert_eq!(correlation.medium_relevance, 1);
    assert_eq!(correlation.low_relevance, 1);

    // The deployment failure three minutes before onset tops the list.
    let top = &correlation.changes[0];
    assert_eq!(top.change.resource_kind, "Deployment");
    assert_eq!(top.relevance_score, 1.0);
    assert_eq!(top.relationship, Relationship::Before);
    assert_eq!(top.time_delta, "3m before");
    assert_eq!(correlation.changes[1].relationship, Relationship::During);
    assert_eq!(correlation.changes[2].relationship, Relationship::After);
}

#[tokio::test]
async fn test_node_condition_changes_fold_into_one_incident() {
    let node = NodeDetail {
        name: "node-1".to_string(),
        conditions: vec![
            NodeCondition {
                condition_type: "Ready".to_string(),
                status: "False".to_string(),
                reason: Some("KubeletNotReady".to_string()),
                message: Some("PLEG is not healthy".to_string()),
                last_transition: Some(at(10, 10)),
            },
            NodeCondition {
                condition_type: "MemoryPressure".to_string(),
                status: "True".to_string(),
                reason: Some("KubeletHasInsufficientMemory".to_string()),
                message: Some("kubelet has insufficient memory available".to_string()),
                last_transition: Some(at(10, 25)),
            },
        ],
    };
    let cluster = Arc::new(FixtureCluster::new().with_node(node));

    let history = HistoryService::from_cluster(Arc::clone(&cluster) as _);
    let result = history
        .query(TimeWindow::new(at(10, 0), at(11, 0)))
        .await
        .unwrap();

    assert_eq!(result.total_changes, 2);
    assert!(result.changes.iter().all(|c| c.resource_kind == "Node"));
    assert_eq!(result.total_incidents, 1);
    let incident = &result.incidents[0];
    assert_eq!(incident.symptom, Symptom::NodeNotReady);
    assert_eq!(incident.count, 2);
    assert_eq!(incident.first_seen, at(10, 10));
    assert_eq!(incident.last_seen, at(10, 25));
    assert_eq!(incident.namespace, "");
    assert_eq!(incident.affected_resources, vec!["node-1"]);
}

#[tokio::test]
async fn test_unreachable_nodes_abort_history_query() {
    let cluster = Arc::new(
        FixtureCluster::new()
            .with_namespace("prod")
            .fail_nodes("connection refused"),
    );

    let history = HistoryService::from_cluster(Arc::clone(&cluster) as _);
    let err = history
        .query(TimeWindow::new(at(10, 0), at(11, 0)))
        .await
        .unwrap_err();

    match err {
        EngineError::FetchFailed { branch, .. } => assert_eq!(branch, "node changes"),
        other => panic!("expected fetch failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rollback_gated_then_executed_on_confirmation() {
    let cluster = Arc::new(
        FixtureCluster::new()
            .with_deployment(available_deployment("prod", "checkout", 3, 3))
            .with_revisions(
                "prod",
                "checkout",
                vec![
                    revision("1", false, 0),
                    revision("2", false, 2),
                    revision("3", true, 3),
                ],
            ),
    );
    let store = Arc::new(ActionHistory::new());

    let engine = HealingEngine::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);
    let request =
        ActionRequest::new(ActionKind::Rollback, ResourceKind::Deployment, "prod", "checkout");
    let suggestion = engine.suggest(&request).await.unwrap();

    assert_eq!(suggestion.rollback_revision.as_deref(), Some("2"));
    assert!(suggestion.requires_approval);

    let executor = ActionExecutor::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);

    let err = executor.execute(&suggestion, false).await.unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationRequired));
    assert!(cluster.mutations().is_empty());
    assert!(store.is_empty());

    let result = executor.execute(&suggestion, true).await.unwrap();
    assert_eq!(result.status, ActionStatus::Completed);
    assert_eq!(
        cluster.mutations(),
        vec![Mutation::Rollback {
            namespace: "prod".to_string(),
            name: "checkout".to_string(),
            revision: "2".to_string(),
        }]
    );
    let records = store.similar_actions(ResourceKind::Deployment, ActionKind::Rollback);
    assert_eq!(records.len(), 1);
    assert!(records[0].succeeded());
}

#[tokio::test]
async fn test_scale_executes_without_approval() {
    let cluster = Arc::new(
        FixtureCluster::new().with_deployment(available_deployment("prod", "checkout", 3, 3)),
    );
    let store = Arc::new(ActionHistory::new());

    let engine = HealingEngine::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);
    let request =
        ActionRequest::new(ActionKind::Scale, ResourceKind::Deployment, "prod", "checkout")
            .with_param("replicas", "5");
    let suggestion = engine.suggest(&request).await.unwrap();

    assert_eq!(suggestion.target_replicas, Some(5));
    assert!(!suggestion.requires_approval);

    // No approval needed, so an unconfirmed execution proceeds.
    let executor = ActionExecutor::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);
    let result = executor.execute(&suggestion, false).await.unwrap();

    assert_eq!(result.status, ActionStatus::Completed);
    assert_eq!(
        cluster.mutations(),
        vec![Mutation::Scale {
            namespace: "prod".to_string(),
            name: "checkout".to_string(),
            replicas: 5,
        }]
    );
}

#[tokio::test]
async fn test_failed_action_recorded_with_error() {
    let cluster = Arc::new(
        FixtureCluster::new()
            .with_deployment(available_deployment("prod", "checkout", 3, 3))
            .fail_mutations("admission webhook denied the request"),
    );
    let store = Arc::new(ActionHistory::new());

    let engine = HealingEngine::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);
    let request =
        ActionRequest::new(ActionKind::Restart, ResourceKind::Deployment, "prod", "checkout");
    let suggestion = engine.suggest(&request).await.unwrap();

    let executor = ActionExecutor::new(Arc::clone(&cluster) as _, Arc::clone(&store) as _);
    let err = executor.execute(&suggestion, true).await.unwrap_err();

    assert!(matches!(err, EngineError::ActionFailed { .. }));
    assert!(err.to_string().contains("admission webhook denied the request"));
    assert!(cluster.mutations().is_empty());

    let records = store.similar_actions(ResourceKind::Deployment, ActionKind::Restart);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ActionStatus::Failed);
    assert!(!records[0].succeeded());
    assert!(records[0]
        .error
        .as_deref()
        .unwrap()
        .contains("admission webhook denied the request"));
}

#[tokio::test]
async fn test_past_failures_lower_suggestion_confidence() {
    let cluster = Arc::new(
        FixtureCluster::new()
            .with_deployment(available_deployment("prod", "checkout", 3, 3))
            .with_revisions(
                "prod",
                "checkout",
                vec![revision("2", false, 2), revision("3", true, 3)],
            ),
    );
    let request =
        ActionRequest::new(ActionKind::Rollback, ResourceKind::Deployment, "prod", "checkout");

    let clean_store = Arc::new(ActionHistory::new());
    let clean_engine = HealingEngine::new(Arc::clone(&cluster) as _, Arc::clone(&clean_store) as _);
    let baseline = clean_engine.suggest(&request).await.unwrap();

    let burnt_store = Arc::new(ActionHistory::new());
    for _ in 0..3 {
        burnt_store.record(ActionRecord {
            resource: ResourceKind::Deployment,
            action: ActionKind::Rollback,
            status: ActionStatus::Failed,
            error: Some("rollout stuck".to_string()),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        });
    }
    let burnt_engine = HealingEngine::new(Arc::clone(&cluster) as _, Arc::clone(&burnt_store) as _);
    let suggestion = burnt_engine.suggest(&request).await.unwrap();

    assert!(suggestion.confidence < baseline.confidence);
    assert!(suggestion.confidence > 0.0 && suggestion.confidence < 1.0);
}

#[tokio::test]
async fn test_pipeline_metrics_exposed_for_scrape() {
    let pod = oom_pod("prod", "payments-api-7d9fb");
    let cluster = FixtureCluster::new()
        .with_pod(pod)
        .with_log("prod", "payments-api-7d9fb", "app", "ok\n");

    let collector = EvidenceCollector::new(Arc::new(cluster));
    collector.collect("prod", "payments-api-7d9fb").await.unwrap();

    let rendered = medic_lib::gather_metrics();
    assert!(rendered.contains("kubemedic_evidence_collection_latency_seconds"));
    assert!(rendered.contains("kubemedic_suggestions_generated_total"));
}
