//! Validation Gate
//!
//! Pluggable evidence checks that run before a task completion commits.
//! Rules are registered explicitly at startup; unknown rule names fail
//! closed rather than being skipped.

pub mod registry;
pub mod rules;

use crate::models::{RuleOutcome, Task};

pub use registry::RuleRegistry;
pub use rules::{EvidencePresent, RequiredFields};

/// A single named evidence check.
///
/// Rules are side-effect-free: they inspect the task and evidence bundle and
/// report an outcome; only the engine mutates state, after aggregating.
pub trait ValidationRule: Send + Sync {
    /// Name the rule is registered and requested under
    fn name(&self) -> &str;

    /// Check the evidence bundle supplied for a task completion
    fn check(&self, task: &Task, evidence: &serde_json::Value) -> RuleOutcome;
}

/// Aggregated result of one gate run
#[derive(Debug, Clone)]
pub struct GateReport {
    /// True iff every requested rule passed
    pub passed: bool,
    /// Outcome of every rule run, in request order. Never truncated at the
    /// first failure, so the caller can fix all issues in one round-trip.
    pub outcomes: Vec<RuleOutcome>,
}

impl GateReport {
    /// Outcomes of rules that failed
    pub fn failures(&self) -> Vec<&RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }
}
