pub mod session;
pub mod task;

pub use session::{Session, SessionStatus, Snapshot, TaskCounts};
pub use task::{RuleOutcome, Task, TaskStatus, ValidationAttempt};
