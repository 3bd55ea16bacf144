//! Observability infrastructure for the diagnosis and healing pipeline
//!
//! Provides:
//! - Prometheus metrics (collection and query latency, incident and action counters)
//! - Structured JSON logging with tracing

use crate::healing::{ActionResult, HealingSuggestion};
use prometheus::{register_histogram, register_int_gauge, Encoder, Histogram, IntGauge, TextEncoder};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cluster-facing latencies (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    evidence_latency_seconds: Histogram,
    history_latency_seconds: Histogram,
    collection_failures: IntGauge,
    sources_skipped: IntGauge,
    incidents_identified: IntGauge,
    changes_correlated: IntGauge,
    suggestions_generated: IntGauge,
    approvals_required: IntGauge,
    actions_executed: IntGauge,
    action_failures: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            evidence_latency_seconds: register_histogram!(
                "kubemedic_evidence_collection_latency_seconds",
                "Time spent collecting diagnostic evidence for one pod",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evidence_collection_latency_seconds"),

            history_latency_seconds: register_histogram!(
                "kubemedic_history_query_latency_seconds",
                "Time spent querying cluster change history",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register history_query_latency_seconds"),

            collection_failures: register_int_gauge!(
                "kubemedic_collection_failures_total",
                "Total number of evidence collection failures"
            )
            .expect("Failed to register collection_failures"),

            sources_skipped: register_int_gauge!(
                "kubemedic_sources_skipped_total",
                "Total number of evidence sources skipped as unavailable"
            )
            .expect("Failed to register sources_skipped"),

            incidents_identified: register_int_gauge!(
                "kubemedic_incidents_identified_total",
                "Total number of incident candidates identified"
            )
            .expect("Failed to register incidents_identified"),

            changes_correlated: register_int_gauge!(
                "kubemedic_changes_correlated_total",
                "Total number of changes scored against incidents"
            )
            .expect("Failed to register changes_correlated"),

            suggestions_generated: register_int_gauge!(
                "kubemedic_suggestions_generated_total",
                "Total number of healing suggestions generated"
            )
            .expect("Failed to register suggestions_generated"),

            approvals_required: register_int_gauge!(
                "kubemedic_approvals_required_total",
                "Total number of suggestions that required operator approval"
            )
            .expect("Failed to register approvals_required"),

            actions_executed: register_int_gauge!(
                "kubemedic_actions_executed_total",
                "Total number of healing actions executed"
            )
            .expect("Failed to register actions_executed"),

            action_failures: register_int_gauge!(
                "kubemedic_action_failures_total",
                "Total number of healing actions that failed"
            )
            .expect("Failed to register action_failures"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        // Initialize global metrics on first call
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record an evidence collection latency observation
    pub fn observe_evidence_latency(&self, duration_secs: f64) {
        self.inner().evidence_latency_seconds.observe(duration_secs);
    }

    /// Record a history query latency observation
    pub fn observe_history_latency(&self, duration_secs: f64) {
        self.inner().history_latency_seconds.observe(duration_secs);
    }

    /// Increment the evidence collection failure counter
    pub fn inc_collection_failures(&self) {
        self.inner().collection_failures.inc();
    }

    /// Increment the skipped evidence source counter
    pub fn inc_sources_skipped(&self) {
        self.inner().sources_skipped.inc();
    }

    /// Add to the identified incident counter
    pub fn add_incidents_identified(&self, count: u64) {
        self.inner().incidents_identified.add(count as i64);
    }

    /// Add to the correlated change counter
    pub fn add_changes_correlated(&self, count: u64) {
        self.inner().changes_correlated.add(count as i64);
    }

    /// Increment the suggestion counter
    pub fn inc_suggestions_generated(&self) {
        self.inner().suggestions_generated.inc();
    }

    /// Increment the approval-required counter
    pub fn inc_approvals_required(&self) {
        self.inner().approvals_required.inc();
    }

    /// Increment the executed action counter
    pub fn inc_actions_executed(&self) {
        self.inner().actions_executed.inc();
    }

    /// Increment the failed action counter
    pub fn inc_action_failures(&self) {
        self.inner().action_failures.inc();
    }
}

/// Render all registered metrics in Prometheus text exposition format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&metric_families, &mut buffer) {
        warn!(event = "metrics_encode_failed", error = %error, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Structured logger for healing events
///
/// Provides consistent JSON-formatted logging for suggestions, approvals,
/// and executed actions.
#[derive(Clone)]
pub struct StructuredLogger {
    context: String,
}

impl StructuredLogger {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }

    /// Log a generated healing suggestion
    pub fn log_suggestion(&self, suggestion: &HealingSuggestion) {
        info!(
            event = "suggestion_generated",
            context = %self.context,
            action = %suggestion.action,
            resource = %suggestion.resource,
            namespace = %suggestion.namespace,
            name = %suggestion.name,
            confidence = suggestion.confidence,
            risk_level = %suggestion.risk_level.as_str(),
            requires_approval = suggestion.requires_approval,
            "Generated healing suggestion"
        );
    }

    /// Log that a suggestion needs operator approval before execution
    pub fn log_approval_required(&self, suggestion: &HealingSuggestion) {
        warn!(
            event = "approval_required",
            context = %self.context,
            action = %suggestion.action,
            resource = %suggestion.resource,
            namespace = %suggestion.namespace,
            name = %suggestion.name,
            confidence = suggestion.confidence,
            risk_level = %suggestion.risk_level.as_str(),
            "Suggestion requires operator approval"
        );
    }

    /// Log the start of an action execution
    pub fn log_action_started(&self, suggestion: &HealingSuggestion) {
        info!(
            event = "action_started",
            context = %self.context,
            action = %suggestion.action,
            resource = %suggestion.resource,
            namespace = %suggestion.namespace,
            name = %suggestion.name,
            "Executing healing action"
        );
    }

    /// Log a completed action
    pub fn log_action_executed(&self, result: &ActionResult) {
        info!(
            event = "action_executed",
            context = %self.context,
            action = %result.action,
            resource = %result.resource,
            namespace = %result.namespace,
            name = %result.name,
            status = %result.status.as_str(),
            "Healing action completed"
        );
    }

    /// Log a failed action
    pub fn log_action_failed(&self, result: &ActionResult, error: &str) {
        warn!(
            event = "action_failed",
            context = %self.context,
            action = %result.action,
            resource = %result.resource,
            namespace = %result.namespace,
            name = %result.name,
            error = %error,
            "Healing action failed"
        );
    }
}
