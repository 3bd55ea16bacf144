//! Cluster change history
//!
//! Everything needed to answer "what changed in this window": raw data
//! sources, the concurrent query service, normalization, and incident
//! candidate mining.

mod service;
mod source;
mod types;

pub use service::HistoryService;
pub use source::{ChangeDataSource, ChangeSourceConfig, ClusterChangeSource};
pub use types::{
    ChangeEvent, ChangeKind, ChangeSeverity, DeploymentChange, DeploymentChangeKind,
    HistoryQueryResult, IncidentCandidate, NodeChange, NodeChangeKind, Symptom, TimeWindow,
};
