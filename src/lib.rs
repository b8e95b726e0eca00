//! Taskstate - Session/Task Lifecycle Engine
//! Durable, concurrency-safe tracking of multi-step work with validation-gated completion

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
pub mod validator;

pub use error::{EngineError, Result};

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{CompletionReport, SessionEngine, SessionSummary, StatusReport};
pub use models::{Session, SessionStatus, Snapshot, Task, TaskStatus};
pub use store::SnapshotStore;
pub use validator::{RuleRegistry, ValidationRule};
