use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};

use portapy_core::inspect::{PortabilityReport, inspect_tree, lister_for};
use portapy_core::{BuildOptions, DryRunRunner, ExecRunner, Orchestrator, package};

use crate::output::{
  format_duration, print_error, print_info, print_success, print_warning, symbols,
};

pub struct BuildArgs {
  pub version: String,
  pub modules: Option<Vec<String>>,
  pub dryrun: bool,
  pub prefix: Option<String>,
  pub target: PathBuf,
  pub no_inspect: bool,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let started = Instant::now();
  let (plan, version) = super::resolve_plan(&args.version, args.modules)?;

  print_info(&format!(
    "Building {} {} for {} ({} modules)",
    portapy_core::FAMILY,
    version,
    plan.platform,
    plan.modules.len()
  ));

  let options = BuildOptions {
    prefix: args.prefix,
    ..BuildOptions::default()
  };

  if args.dryrun {
    let runner = DryRunRunner::new();
    Orchestrator::new(&plan, &args.target, &runner, options).run()?;
    print_info("Dry-run complete; nothing was downloaded or written");
    return Ok(());
  }

  let runner = ExecRunner;
  let orchestrator = Orchestrator::new(&plan, &args.target, &runner, options);
  let dist = orchestrator.folders().dist.clone();
  let outcome = orchestrator.run()?;

  for name in &outcome.skipped {
    print_info(&format!("{name} was already built, skipped"));
  }

  // Inspection is advisory: the artifact is packaged either way and a
  // failed verdict surfaces as a non-zero exit at the end.
  let report = if args.no_inspect {
    None
  } else {
    let lister = lister_for(plan.platform.os, &runner);
    Some(inspect_tree(&outcome.install_tree, plan.platform, &lister)?)
  };

  let artifact = package::package(
    &outcome.install_tree,
    &dist,
    portapy_core::FAMILY,
    &version,
    plan.platform,
  )?;
  print_success(&format!(
    "Built {} in {}",
    artifact.display(),
    format_duration(started.elapsed())
  ));

  match report {
    None => {
      print_warning("Portability check skipped");
      Ok(())
    }
    Some(report) if report.portable => {
      print_success("Portability check passed");
      Ok(())
    }
    Some(report) => {
      print_offenders(&report);
      bail!("built interpreter is not portable");
    }
  }
}

fn print_offenders(report: &PortabilityReport) {
  for record in report.offending() {
    print_error(&format!(
      "{} {} {} ({})",
      record.binary.display(),
      symbols::ARROW,
      record.library,
      super::inspect::class_label(record.classification)
    ));
  }
}
