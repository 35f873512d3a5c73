//! Per-module build state
//!
//! One mutable record per module per build run, owned exclusively by the
//! orchestrator. Persisted as JSON so a rerun after a failure can skip
//! modules already in `Done` state with intact artifacts — resumability
//! is a first-class contract, not an optimization.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Build lifecycle of a single module.
///
/// `Failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Downloading,
    Extracting,
    Configuring,
    Compiling,
    Installing,
    Done,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed)
    }
}

/// Mutable per-module record for one build run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildState {
    pub module: String,
    pub status: Status,
    pub log_path: Option<PathBuf>,
    /// Absolute paths whose presence marks the module's outputs intact.
    pub artifact_paths: Vec<PathBuf>,
}

impl BuildState {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            status: Status::Pending,
            log_path: None,
            artifact_paths: Vec::new(),
        }
    }

    /// Load a module's state record, if a previous run left one.
    pub fn load(path: &Path) -> Result<Option<Self>, CoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Persist the record; called on every status transition so a crash
    /// leaves an accurate picture behind.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// A module is skippable when it finished and everything it installed
    /// is still in place.
    pub fn is_complete(&self) -> bool {
        self.status == Status::Done
            && !self.artifact_paths.is_empty()
            && self.artifact_paths.iter().all(|p| p.exists())
    }
}
