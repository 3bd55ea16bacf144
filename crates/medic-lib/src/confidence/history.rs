//! Action history store
//!
//! Bounded in-memory record of executed actions, shared between the scorer
//! (reads success rates) and the executor (appends outcomes). Oldest records
//! are evicted first once the capacity is reached.

use crate::models::{ActionKind, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;

const DEFAULT_CAPACITY: usize = 1000;

/// Lifecycle state of an executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    InProgress,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }
}

/// One recorded action outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub resource: ResourceKind,
    pub action: ActionKind,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    /// Whether this record counts as a success
    pub fn succeeded(&self) -> bool {
        self.status == ActionStatus::Completed && self.error.is_none()
    }
}

/// Read/append surface the scorer and executor share
pub trait ActionStore: Send + Sync {
    fn record(&self, record: ActionRecord);
    fn similar_actions(&self, resource: ResourceKind, action: ActionKind) -> Vec<ActionRecord>;
    fn overall_success_rate(&self) -> f64;
}

/// In-memory FIFO action store
pub struct ActionHistory {
    records: RwLock<VecDeque<ActionRecord>>,
    capacity: usize,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionStore for ActionHistory {
    fn record(&self, record: ActionRecord) {
        let mut records = self.records.write().unwrap();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    fn similar_actions(&self, resource: ResourceKind, action: ActionKind) -> Vec<ActionRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.resource == resource && r.action == action)
            .cloned()
            .collect()
    }

    fn overall_success_rate(&self) -> f64 {
        let records = self.records.read().unwrap();
        if records.is_empty() {
            return 0.5;
        }
        let successful = records.iter().filter(|r| r.succeeded()).count();
        successful as f64 / records.len() as f64
    }
}
