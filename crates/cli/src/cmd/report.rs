use anyhow::Result;

use portapy_core::Selection;

use crate::output::{print_info, print_stat};

/// Print the resolved plan without touching the network or filesystem.
pub fn cmd_build_report(version: &str, modules: Option<Vec<String>>) -> Result<()> {
  let (plan, version) = super::resolve_plan(version, modules)?;

  print_info(&format!("Build plan for {} {}", plan.family, version));
  print_stat("platform", &plan.platform.to_string());
  let selection = match &plan.selection {
    Selection::Auto => "platform default set".to_string(),
    Selection::Explicit(names) => format!("explicit: {}", names.join(", ")),
  };
  print_stat("selection", &selection);

  println!();
  for (i, module) in plan.modules.iter().enumerate() {
    println!(
      "  {:>2}. {} {}",
      i + 1,
      module.name,
      module.resolved_version(&version)
    );
  }

  Ok(())
}
