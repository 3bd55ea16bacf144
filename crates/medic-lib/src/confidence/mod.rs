//! Confidence scoring and action history
//!
//! The scorer turns a proposed action plus everything known about the target
//! into a single confidence value; the history store feeds it outcomes of
//! past actions so repeated failures lower future confidence.

mod history;
mod scorer;

pub use history::{ActionHistory, ActionRecord, ActionStatus, ActionStore};
pub use scorer::{ConfidenceScorer, ResourceRules, RiskWeights, ScoreBreakdown};
