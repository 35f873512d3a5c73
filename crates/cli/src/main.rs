//! portapy - builds self-contained, relocatable CPython interpreters.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::BuildArgs;

/// Build portable, self-contained CPython interpreters
#[derive(Parser)]
#[command(name = "portapy")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a portable interpreter
  Build {
    /// Interpreter version, e.g. 3.12.6 (default: latest supported)
    #[arg(default_value = "latest")]
    version: String,

    /// Comma-separated module selection (default: platform default set)
    #[arg(short, long, value_delimiter = ',')]
    modules: Option<Vec<String>>,

    /// Print what would be done without doing any of it
    #[arg(long)]
    dryrun: bool,

    /// Fixed install prefix compiled into the interpreter
    /// (default: relocatable /<version>)
    #[arg(long)]
    prefix: Option<String>,

    /// Build root directory
    #[arg(long, default_value = ".")]
    target: PathBuf,

    /// Skip the portability check after the build
    #[arg(long)]
    no_inspect: bool,
  },

  /// Check a built tree (or single binary) for non-portable dependencies
  Inspect {
    /// Installation tree or interpreter binary
    path: PathBuf,

    /// Emit the JSON report instead of text
    #[arg(long)]
    json: bool,
  },

  /// List supported interpreter versions and known modules
  List,

  /// Show the resolved build plan for a version without building
  BuildReport {
    /// Interpreter version, e.g. 3.12.6 (default: latest supported)
    #[arg(default_value = "latest")]
    version: String,

    /// Comma-separated module selection (default: platform default set)
    #[arg(short, long, value_delimiter = ',')]
    modules: Option<Vec<String>>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    )
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Commands::Build {
      version,
      modules,
      dryrun,
      prefix,
      target,
      no_inspect,
    } => cmd::cmd_build(BuildArgs {
      version,
      modules,
      dryrun,
      prefix,
      target,
      no_inspect,
    }),
    Commands::Inspect { path, json } => cmd::cmd_inspect(&path, json),
    Commands::List => cmd::cmd_list(),
    Commands::BuildReport { version, modules } => cmd::cmd_build_report(&version, modules),
  }
}
