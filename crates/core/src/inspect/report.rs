//! Portability report model
//!
//! The JSON rendering of [`PortabilityReport`] is the machine-readable
//! boundary CI systems gate on; field names are a compatibility surface.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::CoreError;

/// Verdict for one dynamic-library reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibClass {
    /// On the platform baseline allow-list: present on any target system.
    SystemBaseline,
    /// Resolvable but outside the baseline; breaks portability.
    External,
    /// Could not be resolved to a path, or the binary could not be parsed.
    Unresolved,
}

/// One discovered dynamic-library reference inside one binary.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyRecord {
    /// Referencing binary, relative to the inspected root.
    pub binary: PathBuf,
    pub library: String,
    pub resolved_path: Option<PathBuf>,
    pub classification: LibClass,
}

impl DependencyRecord {
    pub fn is_offending(&self) -> bool {
        matches!(
            self.classification,
            LibClass::External | LibClass::Unresolved
        )
    }
}

/// Aggregated verdict across every binary in an installation tree.
#[derive(Debug, Clone, Serialize)]
pub struct PortabilityReport {
    pub root: PathBuf,
    pub platform: String,
    /// True iff no record is `external` or `unresolved`.
    pub portable: bool,
    pub records: Vec<DependencyRecord>,
}

impl PortabilityReport {
    pub fn new(root: PathBuf, platform: String, records: Vec<DependencyRecord>) -> Self {
        let portable = !records.iter().any(DependencyRecord::is_offending);
        Self {
            root,
            platform,
            portable,
            records,
        }
    }

    /// Records that break the verdict, in scan order.
    pub fn offending(&self) -> impl Iterator<Item = &DependencyRecord> {
        self.records.iter().filter(|r| r.is_offending())
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
