//! Evidence gathering
//!
//! The evidence snapshot is the diagnoser's only input. Collection is
//! best-effort for everything except the pod status itself.

mod collector;
mod types;

pub use collector::{CollectorConfig, EvidenceCollector};
pub use types::{
    ContainerMetricsEvidence, Evidence, EventEvidence, LogEvidence, MetricsEvidence,
    PodStatusEvidence, NEAR_LIMIT_PERCENT,
};
