mod build;
mod inspect;
mod list;
mod report;

pub use build::{BuildArgs, cmd_build};
pub use inspect::cmd_inspect;
pub use list::cmd_list;
pub use report::cmd_build_report;

use anyhow::Result;
use semver::Version;

use portapy_core::{BuildPlan, CoreError, Registry, Selection, resolve};
use portapy_platform::Platform;

/// Parse, validate and resolve the common version/modules arguments.
fn resolve_plan(version: &str, modules: Option<Vec<String>>) -> Result<(BuildPlan, Version)> {
  let version = portapy_core::parse_version(version)?;
  if !portapy_core::is_supported(&version) {
    return Err(CoreError::UnsupportedVersion(version.to_string()).into());
  }

  let platform = Platform::current();
  let registry = Registry::builtin();
  let selection = match modules {
    Some(names) if !names.is_empty() => Selection::Explicit(names),
    _ => Selection::Auto,
  };

  let plan = resolve(&registry, &version, platform, selection)?;
  Ok((plan, version))
}
