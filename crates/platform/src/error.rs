//! Error types for portapy-platform

use thiserror::Error;

/// Errors that can occur in platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unknown operating system: {0}")]
    UnknownOs(String),

    #[error("Unknown architecture: {0}")]
    UnknownArch(String),

    #[error("Invalid platform string '{0}', expected <os>-<arch> (e.g. linux-x86_64)")]
    InvalidPlatform(String),
}
