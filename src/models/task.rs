//! Task entity and validation history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a single task
///
/// Transitions are strictly forward: pending → in_progress → completed.
/// A completed task is never resurrected; "reopening" is modeled as a new
/// task so audit history stays intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Display name matching the on-disk representation
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

/// Outcome of a single validation rule run against a task's evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Registered name of the rule
    pub rule: String,
    pub passed: bool,
    /// Human-readable detail, present for failures and passes alike
    pub message: String,
}

/// One full run of the validation gate, recorded for audit whether it
/// passed or failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub timestamp: DateTime<Utc>,
    /// True iff every rule in this attempt passed
    pub passed: bool,
    /// Per-rule outcomes in the order the rules were requested
    pub outcomes: Vec<RuleOutcome>,
}

/// A single unit of work within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Opaque caller-supplied text; guaranteed non-empty by the engine
    pub description: String,
    pub status: TaskStatus,
    /// Evidence bundle supplied with the successful completion request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
    /// Every gate run against this task, failed attempts included
    #[serde(default)]
    pub validation_history: Vec<ValidationAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: TaskStatus::Pending,
            evidence: None,
            validation_history: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the task in progress
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Mark the task completed, attaching the evidence that passed the gate
    pub fn complete(&mut self, evidence: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.evidence = Some(evidence);
        self.completed_at = Some(Utc::now());
    }

    /// Record a gate run in the task's audit history
    pub fn record_attempt(&mut self, passed: bool, outcomes: Vec<RuleOutcome>) {
        self.validation_history.push(ValidationAttempt {
            timestamp: Utc::now(),
            passed,
            outcomes,
        });
    }
}
