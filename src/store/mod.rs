//! Durable Snapshot Store
//!
//! Handles crash-safe persistence of session snapshots, including:
//! - Atomic commits (temp file + fsync + rename)
//! - Bounded backup rotation per session
//! - Optimistic version checking
//! - Archival of finished sessions

mod snapshot_store;

pub use snapshot_store::SnapshotStore;
