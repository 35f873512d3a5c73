//! Platform detection and system abstractions for portapy
//!
//! This crate provides cross-platform abstractions for:
//! - OS and architecture detection, platform triple parsing
//! - The per-platform baseline shared-library allow-list
//! - Platform-specific build environment variables

mod baseline;
mod env;
mod error;
mod platform;

pub use baseline::{baseline_libs, is_baseline_lib};
pub use env::build_env;
pub use error::PlatformError;
pub use platform::{Arch, Os, Platform};
