//! SnapshotStore - canonical snapshot files and their backup ring

use crate::error::{EngineError, Result};
use crate::models::Snapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Prefix for in-flight temp files; anything left behind with this prefix is
/// an orphan from an interrupted commit and is discarded on open
const TEMP_PREFIX: &str = ".commit-";

/// Subdirectory holding archived sessions
const ARCHIVE_DIR: &str = "archive";

/// File-backed store of session snapshots.
///
/// One canonical JSON file per session id, plus up to `backup_count` rotated
/// backups (`<id>.json.bak.1` is the newest). The canonical file is never
/// mutated in place: commits write a temp file, sync it, and rename it over
/// the canonical path, so a crash at any point leaves the prior snapshot
/// readable.
pub struct SnapshotStore {
    root: PathBuf,
    backup_count: usize,
}

impl SnapshotStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Recovery is limited to discarding orphaned temp files; canonical files
    /// are self-consistent by construction.
    pub fn open(root: impl Into<PathBuf>, backup_count: usize) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join(ARCHIVE_DIR))?;

        let store = Self { root, backup_count };
        store.discard_orphans()?;
        Ok(store)
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the last committed snapshot for a session.
    ///
    /// Archived sessions remain loadable by id.
    pub fn load(&self, session_id: Uuid) -> Result<Snapshot> {
        let path = self.canonical_path(session_id);
        let path = if path.exists() {
            path
        } else {
            let archived = self.archive_path(session_id);
            if !archived.exists() {
                return Err(EngineError::SessionNotFound(session_id));
            }
            archived
        };

        let content = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    /// Version currently on disk for a session, if any
    pub fn current_version(&self, session_id: Uuid) -> Result<Option<u64>> {
        if !self.canonical_path(session_id).exists() && !self.archive_path(session_id).exists() {
            return Ok(None);
        }
        Ok(Some(self.load(session_id)?.version))
    }

    /// Commit a snapshot atomically, returning the new version.
    ///
    /// `expected_version` must match the version on disk (or 0 for a session
    /// not yet stored); the committed snapshot carries `expected_version + 1`.
    pub fn commit(
        &self,
        session_id: Uuid,
        snapshot: &Snapshot,
        expected_version: u64,
    ) -> Result<u64> {
        let canonical = self.canonical_path(session_id);

        // Archived sessions are read-only: a commit here would write a fresh
        // canonical file and resurrect the id into the live index
        if !canonical.exists() && self.archive_path(session_id).exists() {
            return Err(EngineError::SessionArchived(session_id));
        }

        let actual = match self.current_version(session_id)? {
            Some(v) => v,
            None => 0,
        };
        if actual != expected_version {
            warn!(
                session = %session_id,
                expected = expected_version,
                actual,
                "snapshot version conflict"
            );
            return Err(EngineError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }

        let new_version = expected_version + 1;
        let mut to_write = snapshot.clone();
        to_write.version = new_version;
        let content = serde_json::to_string_pretty(&to_write)?;

        // Temp file lives in the same directory so the final rename is atomic
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".json")
            .tempfile_in(&self.root)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;

        // Copy (not move) the canonical file into the backup ring so it
        // survives a crash before the rename below
        if canonical.exists() {
            self.rotate_backups(session_id)?;
        }

        temp.persist(&canonical).map_err(|e| e.error)?;

        debug!(session = %session_id, version = new_version, "committed snapshot");
        Ok(new_version)
    }

    /// Ids of live (non-archived) sessions known to the store
    pub fn list_sessions(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Ok(id) = stem.parse::<Uuid>() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Move a session out of the live index.
    ///
    /// The canonical snapshot (and its backups) move under `archive/`; the
    /// session disappears from `list_sessions` but stays loadable by id.
    pub fn archive(&self, session_id: Uuid) -> Result<()> {
        let canonical = self.canonical_path(session_id);
        if !canonical.exists() {
            return Err(EngineError::SessionNotFound(session_id));
        }

        fs::rename(&canonical, self.archive_path(session_id))?;

        for i in 1..=self.backup_count {
            let backup = self.backup_path(session_id, i);
            if backup.exists() {
                let target = self
                    .root
                    .join(ARCHIVE_DIR)
                    .join(format!("{}.json.bak.{}", session_id, i));
                fs::rename(&backup, target)?;
            }
        }

        debug!(session = %session_id, "archived session");
        Ok(())
    }

    /// Backup files currently present for a session, newest first
    pub fn backups(&self, session_id: Uuid) -> Vec<PathBuf> {
        (1..=self.backup_count)
            .map(|i| self.backup_path(session_id, i))
            .filter(|p| p.exists())
            .collect()
    }

    // =========================================================================
    // Paths and internals
    // =========================================================================

    fn canonical_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("{}.json", session_id))
    }

    fn archive_path(&self, session_id: Uuid) -> PathBuf {
        self.root
            .join(ARCHIVE_DIR)
            .join(format!("{}.json", session_id))
    }

    fn backup_path(&self, session_id: Uuid, slot: usize) -> PathBuf {
        self.root.join(format!("{}.json.bak.{}", session_id, slot))
    }

    /// Shift backups one slot down, evicting the oldest, then copy the
    /// canonical file into slot 1
    fn rotate_backups(&self, session_id: Uuid) -> Result<()> {
        if self.backup_count == 0 {
            return Ok(());
        }

        let oldest = self.backup_path(session_id, self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (1..self.backup_count).rev() {
            let from = self.backup_path(session_id, i);
            if from.exists() {
                fs::rename(&from, self.backup_path(session_id, i + 1))?;
            }
        }

        fs::copy(self.canonical_path(session_id), self.backup_path(session_id, 1))?;
        Ok(())
    }

    /// Remove temp files left behind by interrupted commits
    fn discard_orphans(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if name.starts_with(TEMP_PREFIX) {
                    warn!(file = name, "discarding orphaned temp file");
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }
}
