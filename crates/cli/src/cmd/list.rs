use anyhow::Result;

use portapy_core::{PlatformMatch, Registry, SUPPORTED_VERSIONS};
use portapy_platform::Platform;

use crate::output::print_info;

pub fn cmd_list() -> Result<()> {
  print_info(&format!("Supported {} versions:", portapy_core::FAMILY));
  for version in SUPPORTED_VERSIONS {
    println!("  {version}");
  }

  let platform = Platform::current();
  let registry = Registry::builtin();

  println!();
  print_info("Known modules:");
  for module in registry.iter().filter(|m| !m.interpreter) {
    let version = module.version.as_deref().unwrap_or("-");
    let mut notes = Vec::new();
    if !module.default {
      notes.push("explicit only".to_string());
    }
    if let PlatformMatch::Only(oses) = &module.platforms {
      let oses: Vec<String> = oses.iter().map(|o| o.to_string()).collect();
      notes.push(format!("{} only", oses.join(", ")));
    }
    if !module.supports(platform) {
      notes.push(format!("unavailable on {platform}"));
    }

    if notes.is_empty() {
      println!("  {} {}", module.name, version);
    } else {
      println!("  {} {} ({})", module.name, version, notes.join("; "));
    }
  }

  Ok(())
}
