use std::path::Path;

use anyhow::{Result, bail};

use portapy_core::ExecRunner;
use portapy_core::inspect::{LibClass, inspect_tree, lister_for};
use portapy_platform::Platform;

use crate::output::{print_error, print_stat, print_success, symbols};

pub fn cmd_inspect(path: &Path, json: bool) -> Result<()> {
  if !path.exists() {
    bail!("no such path: {}", path.display());
  }

  let platform = Platform::current();
  let runner = ExecRunner;
  let lister = lister_for(platform.os, &runner);
  let report = inspect_tree(path, platform, &lister)?;

  if json {
    println!("{}", report.to_json()?);
  } else {
    print_stat("tree", &report.root.display().to_string());
    print_stat("platform", &report.platform);
    print_stat("references", &report.records.len().to_string());
    for record in report.offending() {
      print_error(&format!(
        "{} {} {} ({})",
        record.binary.display(),
        symbols::ARROW,
        record.library,
        class_label(record.classification)
      ));
    }
    if report.portable {
      print_success("portable");
    }
  }

  // Non-zero exit is the CI gate; the report above is the explanation.
  if !report.portable {
    std::process::exit(1);
  }
  Ok(())
}

pub fn class_label(class: LibClass) -> &'static str {
  match class {
    LibClass::SystemBaseline => "system baseline",
    LibClass::External => "external",
    LibClass::Unresolved => "unresolved",
  }
}
