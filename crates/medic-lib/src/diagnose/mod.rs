//! Rule-based root cause analysis
//!
//! A fixed chain of deterministic rules runs over an evidence snapshot in
//! priority order. The first rule that matches produces the diagnosis; when
//! nothing matches, a low-confidence fallback asks for manual investigation.
//! No rule mutates the evidence, so diagnosing the same snapshot twice gives
//! the same answer.

mod rules;

pub use rules::RULES;

use crate::evidence::Evidence;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Confidence level attached to a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Root cause analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub title: String,
    pub confidence: Confidence,
    /// Facts supporting the diagnosis, in the order they were found
    pub evidence: Vec<String>,
    pub recommendations: Vec<String>,
}

/// One diagnostic rule in the chain
pub struct Rule {
    pub name: &'static str,
    pub check: fn(&Evidence) -> Option<Diagnosis>,
}

/// Run the rule chain over the evidence and return the first match,
/// or the unknown-issue fallback.
pub fn diagnose(evidence: &Evidence) -> Diagnosis {
    for rule in RULES {
        if let Some(diagnosis) = (rule.check)(evidence) {
            debug!(
                event = "rule_matched",
                rule = rule.name,
                title = %diagnosis.title,
                "Diagnostic rule matched"
            );
            return diagnosis;
        }
    }
    rules::unknown_issue(evidence)
}
