//! Rule registry and gate evaluation

use crate::error::{EngineError, Result};
use crate::models::{RuleOutcome, Task};
use crate::validator::{GateReport, ValidationRule};
use std::collections::HashMap;
use tracing::debug;

/// Startup-time registry of named validation rules.
///
/// Registration is explicit; there is no runtime discovery. Evaluating a
/// rule name that was never registered is a configuration error, not a pass.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Box<dyn ValidationRule>>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in rules registered
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::validator::EvidencePresent));
        registry
    }

    /// Register a rule under its own name, replacing any previous rule with
    /// the same name
    pub fn register(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.insert(rule.name().to_string(), rule);
    }

    /// Registered rule names, sorted
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Check that every requested name resolves to a registered rule
    pub fn verify_names(&self, rule_names: &[String]) -> Result<()> {
        for name in rule_names {
            if !self.rules.contains_key(name) {
                return Err(EngineError::UnknownValidationRule(name.clone()));
            }
        }
        Ok(())
    }

    /// Run every named rule against the task's evidence and aggregate.
    ///
    /// All rules run even after a failure so the report covers every issue.
    /// An empty rule list passes trivially.
    pub fn evaluate(
        &self,
        task: &Task,
        evidence: &serde_json::Value,
        rule_names: &[String],
    ) -> Result<GateReport> {
        // Resolve all names up front so a typo in the last rule doesn't
        // waste a partial run
        self.verify_names(rule_names)?;

        let mut outcomes: Vec<RuleOutcome> = Vec::with_capacity(rule_names.len());
        for name in rule_names {
            let rule = &self.rules[name];
            outcomes.push(rule.check(task, evidence));
        }

        let passed = outcomes.iter().all(|o| o.passed);
        debug!(
            task = %task.id,
            rules = rule_names.len(),
            passed,
            "evaluated validation gate"
        );

        Ok(GateReport { passed, outcomes })
    }
}
