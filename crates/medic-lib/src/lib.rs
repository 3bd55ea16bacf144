//! Incident diagnosis and self-healing library for Kubernetes workloads
//!
//! This crate provides the core functionality for:
//! - Evidence collection for misbehaving pods (status, events, logs, metrics)
//! - Rule-based diagnosis of common failure modes
//! - Cluster change history and incident mining
//! - Correlation of changes against incident onset
//! - Confidence-scored healing suggestions with safety checks
//! - Gated execution of healing actions with outcome history

pub mod cluster;
pub mod confidence;
pub mod correlate;
pub mod diagnose;
pub mod error;
pub mod evidence;
pub mod healing;
pub mod history;
pub mod models;
pub mod observability;

pub use cluster::{ClusterError, ClusterOps, FixtureCluster};
pub use error::{EngineError, Result};
pub use models::*;
pub use observability::{gather_metrics, EngineMetrics, StructuredLogger};
