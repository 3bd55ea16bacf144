//! Healing action executor
//!
//! Carries out approved suggestions against the cluster and records every
//! outcome in the action history, so the confidence scorer sees failures as
//! well as successes. A suggestion flagged for approval is refused outright
//! unless the caller confirms it; nothing is recorded for a refusal.

use crate::cluster::ClusterOps;
use crate::confidence::{ActionRecord, ActionStatus, ActionStore};
use crate::error::{EngineError, Result};
use crate::healing::engine::DEFAULT_SCALE_REPLICAS;
use crate::healing::types::{ActionResult, HealingSuggestion};
use crate::models::{ActionKind, ResourceKind};
use crate::observability::{EngineMetrics, StructuredLogger};
use chrono::Utc;
use std::sync::Arc;

/// Executes healing suggestions and records their outcomes
pub struct ActionExecutor {
    cluster: Arc<dyn ClusterOps>,
    store: Arc<dyn ActionStore>,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl ActionExecutor {
    pub fn new(cluster: Arc<dyn ClusterOps>, store: Arc<dyn ActionStore>) -> Self {
        Self {
            cluster,
            store,
            logger: StructuredLogger::new("default"),
            metrics: EngineMetrics::new(),
        }
    }

    /// Set the cluster context name used in structured log events
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(context);
        self
    }

    /// Execute one suggestion, honoring its approval flag
    ///
    /// Returns [`EngineError::ConfirmationRequired`] without touching the
    /// cluster or the history when approval is needed and not given.
    pub async fn execute(
        &self,
        suggestion: &HealingSuggestion,
        confirmed: bool,
    ) -> Result<ActionResult> {
        if suggestion.requires_approval && !confirmed {
            return Err(EngineError::ConfirmationRequired);
        }

        self.logger.log_action_started(suggestion);

        let mut result = ActionResult {
            action: suggestion.action,
            resource: suggestion.resource,
            namespace: suggestion.namespace.clone(),
            name: suggestion.name.clone(),
            status: ActionStatus::InProgress,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        match self.dispatch(suggestion).await {
            Ok(()) => {
                result.status = ActionStatus::Completed;
                result.completed_at = Some(Utc::now());
                self.store.record(ActionRecord::from(&result));
                self.metrics.inc_actions_executed();
                self.logger.log_action_executed(&result);
                Ok(result)
            }
            Err(err) => {
                let message = err.to_string();
                result.status = ActionStatus::Failed;
                result.error = Some(message.clone());
                result.completed_at = Some(Utc::now());
                self.store.record(ActionRecord::from(&result));
                self.metrics.inc_actions_executed();
                self.metrics.inc_action_failures();
                self.logger.log_action_failed(&result, &message);
                Err(EngineError::ActionFailed {
                    action: suggestion.action,
                    resource: suggestion.resource,
                    namespace: suggestion.namespace.clone(),
                    name: suggestion.name.clone(),
                    message,
                })
            }
        }
    }

    async fn dispatch(&self, suggestion: &HealingSuggestion) -> Result<()> {
        match suggestion.action {
            ActionKind::Rollback => {
                let revision = suggestion.rollback_revision.as_deref().ok_or_else(|| {
                    EngineError::NoRollbackTarget {
                        namespace: suggestion.namespace.clone(),
                        name: suggestion.name.clone(),
                    }
                })?;
                self.cluster
                    .rollback_deployment(&suggestion.namespace, &suggestion.name, revision)
                    .await?;
                Ok(())
            }
            ActionKind::Scale => {
                let replicas = suggestion.target_replicas.unwrap_or(DEFAULT_SCALE_REPLICAS);
                self.cluster
                    .scale_deployment(&suggestion.namespace, &suggestion.name, replicas)
                    .await?;
                Ok(())
            }
            ActionKind::Restart => {
                if suggestion.resource != ResourceKind::Deployment {
                    return Err(EngineError::UnsupportedAction {
                        action: ActionKind::Restart,
                        resource: suggestion.resource,
                    });
                }
                self.cluster
                    .restart_deployment(&suggestion.namespace, &suggestion.name)
                    .await?;
                Ok(())
            }
            action => Err(EngineError::UnsupportedAction {
                action,
                resource: suggestion.resource,
            }),
        }
    }
}
