//! SessionEngine - session/task lifecycle operations

use crate::config::EngineConfig;
use crate::engine::locks::SessionLocks;
use crate::error::{EngineError, Result};
use crate::models::{RuleOutcome, Session, SessionStatus, Snapshot, Task, TaskCounts, TaskStatus};
use crate::store::SnapshotStore;
use crate::validator::RuleRegistry;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimal task projection returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct TaskBrief {
    pub id: Uuid,
    pub description: String,
}

/// Read-only view of a session's progress
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session_id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub counts: TaskCounts,
    /// The task currently in progress, if any
    pub current_task: Option<TaskBrief>,
}

/// Result of a completion attempt, returned for pass and fail alike
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub task_id: Uuid,
    /// Aggregate gate result: true iff every rule passed
    pub passed: bool,
    /// Task status after the attempt; stays `in_progress` on a blocked fail
    pub status: TaskStatus,
    /// Per-rule detail in request order
    pub outcomes: Vec<RuleOutcome>,
}

/// Final summary returned by `end_session`
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub name: String,
    pub counts: TaskCounts,
    /// True when the session was force-ended with unfinished tasks
    pub forced: bool,
}

/// The lifecycle engine: validates transitions, runs the validation gate,
/// and commits accepted transitions atomically.
///
/// Constructed once at startup and shared by reference; holds no global
/// state beyond its store root and lock table.
pub struct SessionEngine {
    store: SnapshotStore,
    registry: RuleRegistry,
    config: EngineConfig,
    locks: SessionLocks,
}

impl SessionEngine {
    /// Open the engine over the configured data directory
    pub fn new(config: EngineConfig, registry: RuleRegistry) -> Result<Self> {
        let store = SnapshotStore::open(&config.data_dir, config.backup_count)?;
        Ok(Self {
            store,
            registry,
            config,
            locks: SessionLocks::new(),
        })
    }

    /// The underlying store (read access for embedding applications)
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create a new active session with no tasks and persist it
    pub fn create_session(&self, name: impl Into<String>) -> Result<Uuid> {
        let session = Session::new(name);
        let id = session.id;

        let lock = self.locks.acquire(id);
        let _guard = lock.lock().expect("session lock poisoned");

        self.store.commit(id, &Snapshot::initial(session), 0)?;
        info!(session = %id, "created session");
        Ok(id)
    }

    /// Append tasks to the tail of the session's sequence.
    ///
    /// Existing order and statuses are never disturbed; each new task starts
    /// pending. Descriptions must be non-empty.
    pub fn append_tasks(&self, session_id: Uuid, descriptions: &[String]) -> Result<Vec<Uuid>> {
        if descriptions.iter().any(|d| d.trim().is_empty()) {
            return Err(EngineError::EmptyDescription);
        }

        self.with_session(session_id, |session| {
            ensure_active(session)?;

            let mut ids = Vec::with_capacity(descriptions.len());
            for description in descriptions {
                let task = Task::new(description.clone());
                ids.push(task.id);
                session.tasks.push(task);
            }

            debug!(session = %session_id, appended = ids.len(), "appended tasks");
            Ok(ids)
        })
    }

    /// Start the earliest pending task (strict FIFO).
    ///
    /// Fails if another task is already in progress; that signals a caller
    /// protocol violation, not a queue condition.
    pub fn begin_next(&self, session_id: Uuid) -> Result<TaskBrief> {
        self.with_session(session_id, |session| {
            ensure_active(session)?;

            if let Some(task) = session.task_in_progress() {
                return Err(EngineError::TaskAlreadyInProgress {
                    session_id,
                    task_id: task.id,
                });
            }

            let Some(task) = session.first_pending_mut() else {
                return Err(EngineError::NoPendingTask(session_id));
            };
            task.start();

            info!(session = %session_id, task = %task.id, "began task");
            Ok(TaskBrief {
                id: task.id,
                description: task.description.clone(),
            })
        })
    }

    /// Attempt to complete the in-progress task with the supplied evidence.
    ///
    /// The gate runs every configured rule; on aggregate pass the task
    /// completes and the evidence is recorded. On aggregate fail the task
    /// stays in progress and only the failed attempt is persisted for audit,
    /// with the full per-rule detail returned for correction. In advisory
    /// mode the completion commits regardless, still reporting the failures.
    pub fn complete_current(
        &self,
        session_id: Uuid,
        evidence: serde_json::Value,
    ) -> Result<CompletionReport> {
        let rule_names = self.config.completion_rules.clone();
        let advisory = self.config.advisory_validation;

        self.with_session(session_id, |session| {
            ensure_active(session)?;

            let Some(task) = session.task_in_progress() else {
                return Err(EngineError::NoTaskInProgress(session_id));
            };
            let task_id = task.id;

            let report = self.registry.evaluate(task, &evidence, &rule_names)?;
            if !report.passed && !advisory {
                warn!(
                    session = %session_id,
                    task = %task_id,
                    failures = report.failures().len(),
                    "completion blocked by validation gate"
                );
            }

            let task = session
                .task_in_progress_mut()
                .unwrap_or_else(|| unreachable!("in-progress task vanished"));
            task.record_attempt(report.passed, report.outcomes.clone());
            if report.passed || advisory {
                task.complete(evidence.clone());
                info!(session = %session_id, task = %task_id, "completed task");
            }

            Ok(CompletionReport {
                task_id,
                passed: report.passed,
                status: task.status,
                outcomes: report.outcomes,
            })
        })
    }

    /// Counts, current task, and overall status for a session.
    ///
    /// Pure read: bypasses the session lock and observes the last committed
    /// snapshot, never an in-flight one.
    pub fn status(&self, session_id: Uuid) -> Result<StatusReport> {
        let snapshot = self.store.load(session_id)?;
        let session = &snapshot.session;

        Ok(StatusReport {
            session_id: session.id,
            name: session.name.clone(),
            status: session.status,
            counts: session.counts(),
            current_task: session.task_in_progress().map(|t| TaskBrief {
                id: t.id,
                description: t.description.clone(),
            }),
        })
    }

    /// End a session.
    ///
    /// Without `force`, every task must be completed; otherwise the call
    /// fails listing the unfinished task ids. With `force`, the session ends
    /// as a cancellation: unfinished tasks keep their current status.
    pub fn end_session(&self, session_id: Uuid, force: bool) -> Result<SessionSummary> {
        self.with_session(session_id, |session| {
            ensure_active(session)?;

            if !force && !session.all_completed() {
                return Err(EngineError::IncompleteTasks {
                    session_id,
                    task_ids: session.unfinished_task_ids(),
                });
            }

            session.status = SessionStatus::Ended;
            let forced = !session.all_completed();
            info!(session = %session_id, forced, "ended session");

            Ok(SessionSummary {
                session_id,
                name: session.name.clone(),
                counts: session.counts(),
                forced,
            })
        })
    }

    /// Live session ids known to the store
    pub fn list_sessions(&self) -> Result<Vec<Uuid>> {
        self.store.list_sessions()
    }

    /// Move a session out of the live index; it stays loadable by id
    pub fn archive(&self, session_id: Uuid) -> Result<()> {
        let lock = self.locks.acquire(session_id);
        let _guard = lock.lock().expect("session lock poisoned");
        self.store.archive(session_id)
    }

    // =========================================================================
    // Transition plumbing
    // =========================================================================

    /// Run a mutating transition under the session's exclusive lock:
    /// load → apply → commit with the loaded version.
    ///
    /// A `VersionConflict` means a writer bypassed the lock (another process,
    /// or a crashed-and-restarted lock holder); the delta is reapplied on a
    /// fresh snapshot exactly once, then escalated.
    fn with_session<T>(
        &self,
        session_id: Uuid,
        apply: impl Fn(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let lock = self.locks.acquire(session_id);
        let _guard = lock.lock().expect("session lock poisoned");

        match self.try_transition(session_id, &apply) {
            Err(EngineError::VersionConflict { expected, actual }) => {
                warn!(
                    session = %session_id,
                    expected,
                    actual,
                    "version conflict under lock; retrying once"
                );
                self.try_transition(session_id, &apply)
            }
            other => other,
        }
    }

    fn try_transition<T>(
        &self,
        session_id: Uuid,
        apply: &impl Fn(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.store.load(session_id)?;
        let expected = snapshot.version;
        let mut session = snapshot.session;

        let value = apply(&mut session)?;

        let snapshot = Snapshot {
            version: expected,
            session,
        };
        self.store.commit(session_id, &snapshot, expected)?;
        Ok(value)
    }
}

fn ensure_active(session: &Session) -> Result<()> {
    if session.status == SessionStatus::Ended {
        return Err(EngineError::SessionEnded(session.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{EvidencePresent, RequiredFields};
    use serde_json::json;
    use tempfile::TempDir;

    fn engine_with_rules(rules: &[&str], advisory: bool) -> (TempDir, SessionEngine) {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig {
            data_dir: temp_dir.path().join("sessions"),
            backup_count: 2,
            advisory_validation: advisory,
            completion_rules: rules.iter().map(|s| s.to_string()).collect(),
        };

        let mut registry = RuleRegistry::new();
        registry.register(Box::new(EvidencePresent));
        registry.register(Box::new(RequiredFields::new(vec!["notes".to_string()])));

        let engine = SessionEngine::new(config, registry).unwrap();
        (temp_dir, engine)
    }

    fn descriptions(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_status() {
        let (_temp, engine) = engine_with_rules(&[], false);

        let id = engine.create_session("demo").unwrap();
        let status = engine.status(id).unwrap();

        assert_eq!(status.name, "demo");
        assert_eq!(status.status, SessionStatus::Active);
        assert_eq!(status.counts.total(), 0);
        assert!(status.current_task.is_none());
    }

    #[test]
    fn test_status_unknown_session() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let result = engine.status(Uuid::new_v4());
        assert!(matches!(result, Err(EngineError::SessionNotFound(_))));
    }

    #[test]
    fn test_append_preserves_call_order() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();

        engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();
        engine.append_tasks(id, &descriptions(&["C"])).unwrap();

        let snapshot = engine.store().load(id).unwrap();
        let order: Vec<&str> = snapshot
            .session
            .tasks
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_append_rejects_empty_description() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();

        let result = engine.append_tasks(id, &descriptions(&["A", "  "]));
        assert!(matches!(result, Err(EngineError::EmptyDescription)));

        // Nothing was persisted
        assert_eq!(engine.status(id).unwrap().counts.total(), 0);
    }

    #[test]
    fn test_begin_next_is_fifo() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();

        let first = engine.begin_next(id).unwrap();
        assert_eq!(first.description, "A");
    }

    #[test]
    fn test_begin_next_twice_fails() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();

        engine.begin_next(id).unwrap();
        let result = engine.begin_next(id);
        assert!(matches!(
            result,
            Err(EngineError::TaskAlreadyInProgress { .. })
        ));
    }

    #[test]
    fn test_begin_next_empty_queue() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();

        let result = engine.begin_next(id);
        assert!(matches!(result, Err(EngineError::NoPendingTask(_))));
    }

    #[test]
    fn test_complete_without_in_progress() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();

        let result = engine.complete_current(id, json!({}));
        assert!(matches!(result, Err(EngineError::NoTaskInProgress(_))));
    }

    #[test]
    fn test_complete_passing_gate() {
        let (_temp, engine) = engine_with_rules(&["evidence_present"], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();
        engine.begin_next(id).unwrap();

        let report = engine
            .complete_current(id, json!({"notes": "done"}))
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.status, TaskStatus::Completed);

        let status = engine.status(id).unwrap();
        assert_eq!(status.counts.completed, 1);
        assert_eq!(status.counts.pending, 1);
        assert!(status.current_task.is_none());

        // Next task comes out in append order
        let next = engine.begin_next(id).unwrap();
        assert_eq!(next.description, "B");
    }

    #[test]
    fn test_failed_gate_blocks_and_records_attempt() {
        let (_temp, engine) = engine_with_rules(&["evidence_present", "required_fields"], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();

        let report = engine.complete_current(id, json!({})).unwrap();
        assert!(!report.passed);
        assert_eq!(report.status, TaskStatus::InProgress);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| !o.passed));

        // Task stays in progress, failed attempt persisted for audit
        let snapshot = engine.store().load(id).unwrap();
        let task = &snapshot.session.tasks[0];
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.evidence.is_none());
        assert_eq!(task.validation_history.len(), 1);
        assert!(!task.validation_history[0].passed);
    }

    #[test]
    fn test_advisory_mode_completes_despite_failures() {
        let (_temp, engine) = engine_with_rules(&["required_fields"], true);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();

        let report = engine.complete_current(id, json!({"other": 1})).unwrap();
        assert!(!report.passed);
        assert_eq!(report.status, TaskStatus::Completed);
    }

    #[test]
    fn test_unknown_rule_fails_closed() {
        let (_temp, engine) = engine_with_rules(&["no_such_rule"], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();

        let result = engine.complete_current(id, json!({"notes": "done"}));
        assert!(matches!(
            result,
            Err(EngineError::UnknownValidationRule(_))
        ));

        // Transition did not commit
        let snapshot = engine.store().load(id).unwrap();
        assert!(snapshot.session.tasks[0].validation_history.is_empty());
    }

    #[test]
    fn test_end_session_requires_completion() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();

        let result = engine.end_session(id, false);
        match result {
            Err(EngineError::IncompleteTasks { task_ids, .. }) => {
                assert_eq!(task_ids.len(), 2);
            }
            other => panic!("expected IncompleteTasks, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_end_session_force_cancels() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();

        let summary = engine.end_session(id, true).unwrap();
        assert!(summary.forced);

        // Cancellation, not completion: the task keeps its status
        let snapshot = engine.store().load(id).unwrap();
        assert_eq!(snapshot.session.status, SessionStatus::Ended);
        assert_eq!(snapshot.session.tasks[0].status, TaskStatus::InProgress);

        // Ended is terminal
        let result = engine.begin_next(id);
        assert!(matches!(result, Err(EngineError::SessionEnded(_))));
        let result = engine.append_tasks(id, &descriptions(&["C"]));
        assert!(matches!(result, Err(EngineError::SessionEnded(_))));
    }

    #[test]
    fn test_complete_after_force_end_fails() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();
        engine.end_session(id, true).unwrap();

        // The cancelled task cannot be completed after the fact
        let result = engine.complete_current(id, json!({"notes": "late"}));
        assert!(matches!(result, Err(EngineError::SessionEnded(_))));

        let snapshot = engine.store().load(id).unwrap();
        assert_eq!(snapshot.session.status, SessionStatus::Ended);
        assert_eq!(snapshot.session.tasks[0].status, TaskStatus::InProgress);
        assert!(snapshot.session.tasks[0].evidence.is_none());
        assert_eq!(engine.status(id).unwrap().counts.completed, 0);
    }

    #[test]
    fn test_archived_session_rejects_mutation() {
        let (_temp, engine) = engine_with_rules(&[], false);

        // Archived while still active: the commit path itself must refuse
        let id = engine.create_session("demo").unwrap();
        engine.archive(id).unwrap();

        let result = engine.append_tasks(id, &descriptions(&["late"]));
        assert!(matches!(result, Err(EngineError::SessionArchived(_))));

        // The id must not reappear in the live index
        assert!(engine.list_sessions().unwrap().is_empty());
        assert_eq!(engine.status(id).unwrap().counts.total(), 0);

        // An ended-then-archived session is refused as ended, and stays out
        // of the live index just the same
        let id = engine.create_session("done").unwrap();
        engine.end_session(id, false).unwrap();
        engine.archive(id).unwrap();

        let result = engine.append_tasks(id, &descriptions(&["late"]));
        assert!(matches!(result, Err(EngineError::SessionEnded(_))));
        assert!(engine.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_ending_never_implicit() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.append_tasks(id, &descriptions(&["A"])).unwrap();
        engine.begin_next(id).unwrap();
        engine.complete_current(id, json!({"notes": "x"})).unwrap();

        // All tasks done, session still active; caller may append more
        let status = engine.status(id).unwrap();
        assert_eq!(status.status, SessionStatus::Active);
        engine.append_tasks(id, &descriptions(&["B"])).unwrap();

        let summary = engine.end_session(id, false);
        assert!(matches!(
            summary,
            Err(EngineError::IncompleteTasks { .. })
        ));
    }

    #[test]
    fn test_list_and_archive() {
        let (_temp, engine) = engine_with_rules(&[], false);
        let id = engine.create_session("demo").unwrap();
        engine.end_session(id, false).unwrap();

        assert_eq!(engine.list_sessions().unwrap(), vec![id]);
        engine.archive(id).unwrap();
        assert!(engine.list_sessions().unwrap().is_empty());

        // Archived sessions stay readable
        let status = engine.status(id).unwrap();
        assert_eq!(status.status, SessionStatus::Ended);
    }

    #[test]
    fn test_recovers_across_restart() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig {
            data_dir: temp_dir.path().join("sessions"),
            ..EngineConfig::default()
        };

        let id = {
            let engine =
                SessionEngine::new(config.clone(), RuleRegistry::new()).unwrap();
            let id = engine.create_session("demo").unwrap();
            engine.append_tasks(id, &descriptions(&["A", "B"])).unwrap();
            engine.begin_next(id).unwrap();
            id
        };

        // Fresh engine over the same data dir sees the committed state
        let engine = SessionEngine::new(config, RuleRegistry::new()).unwrap();
        let status = engine.status(id).unwrap();
        assert_eq!(status.counts.in_progress, 1);
        assert_eq!(status.counts.pending, 1);
        assert_eq!(status.current_task.unwrap().description, "A");
    }
}
