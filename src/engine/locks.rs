//! Per-session mutual exclusion

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Exclusive locks keyed by session id.
///
/// Mutating operations against the same session are fully serialized in
/// lock-acquisition order; operations on different sessions never contend.
/// Reads bypass these locks and observe the last committed snapshot.
#[derive(Default)]
pub struct SessionLocks {
    map: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the lock for a session id, creating it on first use.
    ///
    /// The caller locks the returned mutex for the duration of the
    /// operation; the guard drop releases it on every exit path. Entries
    /// are kept for the process lifetime so every writer for an id
    /// contends on the same mutex.
    pub fn acquire(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.map
            .lock()
            .expect("session lock map poisoned")
            .entry(session_id)
            .or_default()
            .clone()
    }
}
