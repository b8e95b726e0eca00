//! Built-in validation rules
//!
//! Small evidence checks useful out of the box. Anything heavier (syntax
//! checking, file existence) belongs to the embedding application, which
//! registers its own `ValidationRule` implementations.

use crate::models::{RuleOutcome, Task};
use crate::validator::ValidationRule;

/// Passes when the evidence bundle is a non-empty JSON object
pub struct EvidencePresent;

impl ValidationRule for EvidencePresent {
    fn name(&self) -> &str {
        "evidence_present"
    }

    fn check(&self, _task: &Task, evidence: &serde_json::Value) -> RuleOutcome {
        let (passed, message) = match evidence.as_object() {
            Some(map) if !map.is_empty() => (true, "evidence bundle present".to_string()),
            Some(_) => (false, "evidence bundle is empty".to_string()),
            None => (
                false,
                format!("evidence must be an object, got {}", json_type_name(evidence)),
            ),
        };

        RuleOutcome {
            rule: self.name().to_string(),
            passed,
            message,
        }
    }
}

/// Passes when every configured field is a present, non-null top-level key
/// of the evidence bundle
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl ValidationRule for RequiredFields {
    fn name(&self) -> &str {
        "required_fields"
    }

    fn check(&self, _task: &Task, evidence: &serde_json::Value) -> RuleOutcome {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| evidence.get(f.as_str()).map_or(true, |v| v.is_null()))
            .map(String::as_str)
            .collect();

        let (passed, message) = if missing.is_empty() {
            (true, "all required fields present".to_string())
        } else {
            (false, format!("missing fields: {}", missing.join(", ")))
        };

        RuleOutcome {
            rule: self.name().to_string(),
            passed,
            message,
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
