//! Error types for portapy-core

use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    // Static metadata problems: a registry bug, never retried.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Invalid module registry: {0}")]
    InvalidRegistry(String),

    #[error("Dependency cycle in module registry involving '{0}'")]
    DependencyCycle(String),

    // Requested combination cannot be built; reported before any side effect.
    #[error("Module '{module}' is not supported on {platform}")]
    UnsupportedModule { module: String, platform: String },

    #[error("Version {0} is not a supported interpreter version")]
    UnsupportedVersion(String),

    #[error("Invalid version '{given}': {reason}")]
    InvalidVersion { given: String, reason: String },

    // A native build tool invocation went wrong; halts the plan.
    #[error("{step} failed for module '{module}' (exit code {code:?})\n{log_tail}")]
    StepFailed {
        module: String,
        step: String,
        code: Option<i32>,
        log_tail: String,
    },

    #[error("Command timed out after {seconds}s: {program}")]
    StepTimedOut { program: String, seconds: u64 },

    #[error("Command failed with exit code {code:?}: {program}")]
    CommandFailed { program: String, code: Option<i32> },

    #[error("Fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Hash mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("Platform error: {0}")]
    Platform(#[from] portapy_platform::PlatformError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
