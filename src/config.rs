//! Engine configuration
//!
//! Loaded once at startup from a TOML file; all fields have defaults so a
//! missing file yields a usable engine.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of rotated backup snapshots kept per session when unconfigured
pub const DEFAULT_BACKUP_COUNT: usize = 3;

/// Configuration for the lifecycle engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding canonical snapshot files
    pub data_dir: PathBuf,

    /// Size of the per-session backup ring; oldest backup is evicted first
    pub backup_count: usize,

    /// When true, a failed validation aggregate annotates the completion
    /// instead of blocking it
    pub advisory_validation: bool,

    /// Rule names the gate runs on every completion attempt
    pub completion_rules: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".taskstate/sessions"),
            backup_count: DEFAULT_BACKUP_COUNT,
            advisory_validation: false,
            completion_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
