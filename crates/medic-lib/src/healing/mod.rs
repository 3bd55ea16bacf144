//! Healing suggestion and execution
//!
//! Three stages: assessment turns raw resource detail into classified
//! health, the engine turns an action request into a safety-checked and
//! confidence-scored suggestion, and the executor carries approved
//! suggestions out while recording every outcome.

mod assess;
mod engine;
mod executor;
mod types;

pub use assess::{assess_deployment, assess_pod};
pub use engine::{HealingConfig, HealingEngine};
pub use executor::ActionExecutor;
pub use types::{ActionResult, CheckStatus, HealingSuggestion, RiskLevel, SafetyCheck};
