//! Error types for the diagnosis and healing pipeline

use crate::cluster::ClusterError;
use crate::models::{ActionKind, ResourceKind};
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors surfaced by the pipeline
///
/// Soft failures (per-source evidence gaps, per-namespace listing problems)
/// never reach this type; they are recorded inline in the data they affect.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A hard failure from the cluster accessor
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The operation exceeded its deadline; no partial result is returned
    #[error("operation timed out after {0:?}")]
    DeadlineExceeded(Duration),

    /// Rollback was requested but no prior revision is eligible
    #[error("no suitable previous revision found for rollback of {namespace}/{name}")]
    NoRollbackTarget { namespace: String, name: String },

    /// The suggestion requires approval and the caller did not confirm
    #[error("action requires user confirmation")]
    ConfirmationRequired,

    /// The requested action cannot be executed for this resource kind
    #[error("{action} is not implemented for resource type {resource}")]
    UnsupportedAction {
        action: ActionKind,
        resource: ResourceKind,
    },

    /// A mutating action was dispatched and failed; the outcome is already
    /// recorded in the action history
    #[error("{action} of {resource} {namespace}/{name} failed: {message}")]
    ActionFailed {
        action: ActionKind,
        resource: ResourceKind,
        namespace: String,
        name: String,
        message: String,
    },

    /// One of the history fetch tasks panicked or was cancelled
    #[error("{branch} fetch task aborted: {message}")]
    FetchTask {
        branch: &'static str,
        message: String,
    },

    /// A history fetch branch failed, aborting the whole query
    #[error("failed to fetch {branch}: {source}")]
    FetchFailed {
        branch: &'static str,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Wrap a branch failure from the history fan-out
    pub(crate) fn fetch_failed(branch: &'static str, source: EngineError) -> Self {
        EngineError::FetchFailed {
            branch,
            source: Box::new(source),
        }
    }
}
