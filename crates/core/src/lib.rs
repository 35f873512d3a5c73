//! portapy-core: Core logic for portapy
//!
//! This crate provides the module registry, dependency resolution, build
//! orchestration, portability inspection and packaging behind the portapy
//! CLI.

mod error;
pub mod fetch;
mod folders;
pub mod inspect;
mod orchestrate;
pub mod package;
mod registry;
mod resolver;
mod runner;
mod state;
mod versions;

pub use error::CoreError;
pub use folders::Folders;
pub use orchestrate::{BuildOptions, BuildOutcome, Orchestrator};
pub use registry::{BuildKind, ModuleSpec, PlatformMatch, Registry};
pub use resolver::{BuildPlan, Selection, resolve};
pub use runner::{DryRunRunner, ExecRunner, ProcessRunner, StepOutput, StepRequest};
pub use state::{BuildState, Status};
pub use versions::{FAMILY, SUPPORTED_VERSIONS, is_supported, latest, parse_version};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
