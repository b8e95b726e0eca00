//! Engine error taxonomy
//!
//! Every operation returns a typed error rather than a dynamic one so the
//! dispatcher can map failures onto its wire protocol without string matching.

use uuid::Uuid;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the lifecycle engine, store, and validation gate
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No session with the given id exists in the store
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The session has already ended; no further mutation is allowed
    #[error("session {0} has ended")]
    SessionEnded(Uuid),

    /// begin_next called while another task is already in progress
    #[error("task {task_id} is already in progress in session {session_id}")]
    TaskAlreadyInProgress { session_id: Uuid, task_id: Uuid },

    /// begin_next called with no pending tasks remaining
    #[error("session {0} has no pending task")]
    NoPendingTask(Uuid),

    /// complete_current called while no task is in progress
    #[error("session {0} has no task in progress")]
    NoTaskInProgress(Uuid),

    /// end_session without force while tasks remain unfinished
    #[error("session {session_id} has {} incomplete task(s)", .task_ids.len())]
    IncompleteTasks {
        session_id: Uuid,
        task_ids: Vec<Uuid>,
    },

    /// Task descriptions must be non-empty
    #[error("task description must not be empty")]
    EmptyDescription,

    /// Mutation attempted on a session that has been moved to the archive.
    /// Archived sessions stay readable by id but never accept commits.
    #[error("session {0} is archived")]
    SessionArchived(Uuid),

    /// Optimistic-concurrency check failed at the storage layer
    #[error("version conflict: expected {expected}, store has {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// A completion referenced a validation rule that was never registered.
    /// Fails closed: a missing validator must never pass silently.
    #[error("unknown validation rule: {0}")]
    UnknownValidationRule(String),

    #[error("failed to read or write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),
}

impl EngineError {
    /// True for errors that describe a wrong-state request rather than a
    /// storage or configuration fault
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::SessionEnded(_)
                | EngineError::TaskAlreadyInProgress { .. }
                | EngineError::NoPendingTask(_)
                | EngineError::NoTaskInProgress(_)
                | EngineError::IncompleteTasks { .. }
                | EngineError::EmptyDescription
        )
    }
}
