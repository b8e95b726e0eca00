//! Session entity and its durable snapshot projection

use crate::models::task::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session; `Ended` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Counts of tasks by status, for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed
    }
}

/// A session: an ordered sequence of tasks worked through front to back.
///
/// Insertion order is execution order. At most one task is in progress at
/// any time; the engine enforces that invariant across transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Execution order; append-only, never reordered
    pub tasks: Vec<Task>,
}

impl Session {
    /// Create a new active session with no tasks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    /// The task currently in progress, if any.
    ///
    /// Panics if more than one task is in progress; that invariant can only
    /// be broken by an engine bug, not by caller input.
    pub fn task_in_progress(&self) -> Option<&Task> {
        let mut found = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress);
        let first = found.next();
        assert!(
            found.next().is_none(),
            "session {} has multiple tasks in progress",
            self.id
        );
        first
    }

    /// Mutable access to the in-progress task
    pub fn task_in_progress_mut(&mut self) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::InProgress)
    }

    /// The earliest pending task by insertion order (strict FIFO)
    pub fn first_pending_mut(&mut self) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::Pending)
    }

    /// Count tasks by status
    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }

    /// Ids of tasks that are not yet completed
    pub fn unfinished_task_ids(&self) -> Vec<Uuid> {
        self.tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .map(|t| t.id)
            .collect()
    }

    /// True when every task has completed
    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }
}

/// The durable projection of a session: the unit of atomic write and of
/// backup rotation.
///
/// `version` increases by one on every successful commit and backs the
/// optimistic-concurrency check in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub session: Session,
}

impl Snapshot {
    /// Version-zero snapshot of a freshly created session
    pub fn initial(session: Session) -> Self {
        Self {
            version: 0,
            session,
        }
    }
}
