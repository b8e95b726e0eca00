//! Lifecycle Engine
//!
//! The state machine driving sessions and tasks, including:
//! - Legal phase transitions and their guard conditions
//! - Validation gating of task completions
//! - Per-session command serialization
//! - Atomic commit of every accepted transition

mod locks;
mod session_engine;

pub use locks::SessionLocks;
pub use session_engine::{CompletionReport, SessionEngine, SessionSummary, StatusReport, TaskBrief};
