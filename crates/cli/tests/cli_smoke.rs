//! CLI smoke tests for portapy.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes. Nothing here touches the network: only
//! dry-run builds and pure metadata commands are exercised.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the portapy binary.
fn portapy_cmd() -> Command {
  cargo_bin_cmd!("portapy")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  portapy_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  portapy_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("portapy"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "inspect", "list", "build-report"] {
    portapy_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// list
// =============================================================================

#[test]
fn list_shows_versions_and_modules() {
  portapy_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("3.12.6"))
    .stdout(predicate::str::contains("zlib"))
    .stdout(predicate::str::contains("openssl"));
}

// =============================================================================
// build-report
// =============================================================================

#[test]
fn build_report_orders_interpreter_last() {
  let output = portapy_cmd()
    .args(["build-report", "3.12.6", "-m", "zlib,openssl"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let stdout = String::from_utf8(output).unwrap();
  let zlib = stdout.find("zlib").unwrap();
  let openssl = stdout.find("openssl").unwrap();
  let cpython = stdout.find("cpython").unwrap();
  assert!(zlib < openssl);
  assert!(openssl < cpython);
}

#[test]
fn build_report_rejects_unknown_module() {
  portapy_cmd()
    .args(["build-report", "3.12.6", "-m", "ncurses"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown module"));
}

// =============================================================================
// build
// =============================================================================

#[test]
fn dryrun_build_narrates_without_writing() {
  let temp = TempDir::new().unwrap();

  portapy_cmd()
    .args(["build", "3.12.6", "--dryrun", "--target"])
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Would download"))
    .stdout(predicate::str::contains("Would run:"));

  // Nothing may appear under the build root.
  assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}

#[test]
fn dryrun_output_is_deterministic() {
  let temp = TempDir::new().unwrap();

  let run = || {
    let output = portapy_cmd()
      .args(["build", "3.12.6", "--dryrun", "--target"])
      .arg(temp.path())
      .output()
      .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
  };

  assert_eq!(run(), run());
}

#[test]
fn build_rejects_partial_version() {
  portapy_cmd()
    .args(["build", "3.12", "--dryrun"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("major.minor.patch"));
}

#[test]
fn build_rejects_unsupported_version() {
  portapy_cmd()
    .args(["build", "2.7.18", "--dryrun"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not a supported interpreter version"));
}

#[test]
fn build_rejects_unknown_module_before_any_download() {
  let temp = TempDir::new().unwrap();

  portapy_cmd()
    .args(["build", "3.12.6", "-m", "nosuchlib", "--dryrun", "--target"])
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown module"));

  assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}

// =============================================================================
// inspect
// =============================================================================

#[test]
fn inspect_missing_path_fails() {
  portapy_cmd()
    .args(["inspect", "/no/such/tree"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no such path"));
}

#[test]
fn inspect_empty_tree_is_portable() {
  // A tree with no binaries has no dependencies to object to.
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("README"), "not a binary").unwrap();

  portapy_cmd()
    .arg("inspect")
    .arg(temp.path())
    .arg("--json")
    .assert()
    .success()
    .stdout(predicate::str::contains("\"portable\": true"));
}
