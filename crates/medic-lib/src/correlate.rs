//! Incident change correlation
//!
//! Scores every change in a lookback window against an incident by additive
//! relevance weights, classifies each change as before/during/after, and
//! returns the lot sorted by relevance. The weights are plain data so a
//! product can tune them; the defaults are the canonical values.

use crate::error::Result;
use crate::history::{
    ChangeEvent, ChangeKind, ChangeSeverity, HistoryService, IncidentCandidate, TimeWindow,
};
use crate::observability::EngineMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_LOOKBACK: Duration = Duration::from_secs(30 * 60);
/// Scores above this are high relevance
const HIGH_RELEVANCE: f64 = 0.7;
/// Scores from this up to the high cutoff are medium relevance
const MEDIUM_RELEVANCE: f64 = 0.4;

/// Additive relevance weights; the total is clamped to 1.0
#[derive(Debug, Clone)]
pub struct CorrelationWeights {
    /// Change in the incident's namespace
    pub namespace_match: f64,
    /// Change touching the incident's resource
    pub name_match: f64,
    /// Change up to five minutes before the incident started
    pub recent_change: f64,
    /// Change five to fifteen minutes before the incident started
    pub earlier_change: f64,
    pub error_severity: f64,
    pub warning_severity: f64,
    /// Deployment changes get a flat bonus; they are the most common cause
    pub deployment_change: f64,
}

impl Default for CorrelationWeights {
    fn default() -> Self {
        Self {
            namespace_match: 0.3,
            name_match: 0.4,
            recent_change: 0.2,
            earlier_change: 0.1,
            error_severity: 0.1,
            warning_severity: 0.05,
            deployment_change: 0.05,
        }
    }
}

/// Configuration for the correlator
#[derive(Debug, Clone, Default)]
pub struct CorrelatorConfig {
    pub weights: CorrelationWeights,
    /// Used when the caller passes a zero lookback
    pub default_lookback: Option<Duration>,
}

/// The incident a correlation query runs against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRef {
    pub namespace: String,
    pub resource_name: String,
    pub started_at: DateTime<Utc>,
}

impl IncidentRef {
    pub fn new(
        namespace: impl Into<String>,
        resource_name: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            resource_name: resource_name.into(),
            started_at,
        }
    }
}

impl From<&IncidentCandidate> for IncidentRef {
    fn from(candidate: &IncidentCandidate) -> Self {
        Self {
            namespace: candidate.namespace.clone(),
            resource_name: candidate.service.clone(),
            started_at: candidate.first_seen,
        }
    }
}

/// Temporal relationship of a change to the incident start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Before,
    During,
    After,
}

/// One scored change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedChange {
    pub change: ChangeEvent,
    pub relevance_score: f64,
    pub relationship: Relationship,
    /// Human-readable distance from the incident start
    pub time_delta: String,
}

/// Full correlation output, changes sorted by relevance descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub incident_start: DateTime<Utc>,
    pub changes: Vec<CorrelatedChange>,
    pub total_changes: usize,
    pub high_relevance: usize,
    pub medium_relevance: usize,
    pub low_relevance: usize,
}

/// Correlates history changes with an incident
pub struct ChangeCorrelator {
    history: Arc<HistoryService>,
    config: CorrelatorConfig,
    metrics: EngineMetrics,
}

impl ChangeCorrelator {
    pub fn new(history: Arc<HistoryService>) -> Self {
        Self::with_config(history, CorrelatorConfig::default())
    }

    pub fn with_config(history: Arc<HistoryService>, config: CorrelatorConfig) -> Self {
        Self {
            history,
            config,
            metrics: EngineMetrics::new(),
        }
    }

    /// Correlate changes in `[started_at - lookback, now)` with the incident.
    /// A zero lookback selects the default of thirty minutes.
    pub async fn correlate(
        &self,
        incident: &IncidentRef,
        lookback: Duration,
    ) -> Result<CorrelationResult> {
        let lookback = if lookback.is_zero() {
            self.config.default_lookback.unwrap_or(DEFAULT_LOOKBACK)
        } else {
            lookback
        };
        let lookback = chrono::Duration::from_std(lookback)
            .unwrap_or_else(|_| chrono::Duration::days(365));

        let window = TimeWindow::new(incident.started_at - lookback, Utc::now());
        let result = self.history.query(window).await?;

        let mut high = 0usize;
        let mut medium = 0usize;
        let mut low = 0usize;
        let mut changes: Vec<CorrelatedChange> = result
            .changes
            .into_iter()
            .map(|change| {
                let scored = self.score(incident, change);
                if scored.relevance_score > HIGH_RELEVANCE {
                    high += 1;
                } else if scored.relevance_score >= MEDIUM_RELEVANCE {
                    medium += 1;
                } else {
                    low += 1;
                }
                scored
            })
            .collect();

        // Stable sort keeps the source order for equal scores.
        changes.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });

        self.metrics.add_changes_correlated(changes.len() as u64);
        debug!(
            event = "changes_correlated",
            resource = %incident.resource_name,
            namespace = %incident.namespace,
            total = changes.len(),
            high,
            medium,
            low,
            "Correlated changes with incident"
        );

        Ok(CorrelationResult {
            incident_start: incident.started_at,
            total_changes: changes.len(),
            high_relevance: high,
            medium_relevance: medium,
            low_relevance: low,
            changes,
        })
    }

    fn score(&self, incident: &IncidentRef, change: ChangeEvent) -> CorrelatedChange {
        let weights = &self.config.weights;
        let mut score = 0.0;

        if change.namespace == incident.namespace {
            score += weights.namespace_match;
        }
        if change.resource_name == incident.resource_name {
            score += weights.name_match;
        }

        // Positive diff means the change happened before the incident.
        let diff = incident.started_at.signed_duration_since(change.timestamp);
        if diff >= chrono::Duration::zero() && diff <= chrono::Duration::minutes(5) {
            score += weights.recent_change;
        } else if diff >= chrono::Duration::zero() && diff <= chrono::Duration::minutes(15) {
            score += weights.earlier_change;
        }

        match change.severity {
            ChangeSeverity::Error => score += weights.error_severity,
            ChangeSeverity::Warning => score += weights.warning_severity,
            ChangeSeverity::Info => {}
        }

        if change.kind == ChangeKind::Deployment {
            score += weights.deployment_change;
        }

        if score > 1.0 {
            score = 1.0;
        }

        let one_minute = chrono::Duration::minutes(1);
        let (relationship, time_delta) = if diff < -one_minute {
            (
                Relationship::After,
                format!("{} after", format_time_delta(-diff)),
            )
        } else if diff > one_minute {
            (
                Relationship::Before,
                format!("{} before", format_time_delta(diff)),
            )
        } else {
            (Relationship::During, "during incident".to_string())
        };

        CorrelatedChange {
            change,
            relevance_score: score,
            relationship,
            time_delta,
        }
    }
}

fn format_time_delta(d: chrono::Duration) -> String {
    if d < chrono::Duration::minutes(1) {
        "<1m".to_string()
    } else if d < chrono::Duration::hours(1) {
        format!("{}m", d.num_minutes())
    } else if d < chrono::Duration::hours(24) {
        format!("{}h", d.num_hours())
    } else {
        format!("{}d", d.num_days())
    }
}
