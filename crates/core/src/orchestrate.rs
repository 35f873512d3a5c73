//! Build orchestration
//!
//! Drives a [`BuildPlan`] to completion: one module at a time, in plan
//! order, each through acquire -> extract -> configure -> compile ->
//! install. Every native tool invocation goes through the injected
//! [`ProcessRunner`], so the whole flow is testable without a compiler
//! and a dry-run narrates without mutating anything.
//!
//! A failed step halts the plan. Per-module state records make reruns
//! skip modules that already finished with their artifacts intact.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use semver::Version;
use tracing::{info, warn};

use portapy_platform::{Arch, Os, Platform, build_env};

use crate::error::CoreError;
use crate::fetch;
use crate::folders::Folders;
use crate::registry::{BuildKind, ModuleSpec};
use crate::resolver::BuildPlan;
use crate::runner::{ProcessRunner, StepOutput, StepRequest};
use crate::state::{BuildState, Status};

const LOG_TAIL_LINES: usize = 30;

/// Knobs for one build invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Install prefix compiled into the interpreter. Defaults to
    /// `/<version>`, which makes the unpacked artifact's layout match the
    /// compiled-in paths wherever it lands.
    pub prefix: Option<String>,
    /// Per-step timeout; `None` lets steps run as long as they need.
    pub step_timeout: Option<Duration>,
    /// `make -j` parallelism; `None` uses the machine's CPU count.
    pub jobs: Option<usize>,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub install_tree: PathBuf,
    /// Modules built this run, in order.
    pub built: Vec<String>,
    /// Modules skipped because a prior run completed them.
    pub skipped: Vec<String>,
}

/// Executes one build plan against one build root. Single writer for
/// everything under that root.
pub struct Orchestrator<'a, R: ProcessRunner> {
    plan: &'a BuildPlan,
    folders: Folders,
    runner: &'a R,
    options: BuildOptions,
}

impl<'a, R: ProcessRunner> Orchestrator<'a, R> {
    pub fn new(plan: &'a BuildPlan, base: &Path, runner: &'a R, options: BuildOptions) -> Self {
        let folders = Folders::new(base, &plan.version);
        Self {
            plan,
            folders,
            runner,
            options,
        }
    }

    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    /// The prefix compiled into the interpreter binary.
    pub fn compiled_prefix(&self) -> String {
        match &self.options.prefix {
            Some(prefix) => prefix.clone(),
            None => format!("/{}", self.plan.version),
        }
    }

    /// Where `make install DESTDIR=` lands the interpreter's files.
    pub fn install_tree(&self) -> PathBuf {
        let relative = self.compiled_prefix();
        self.folders
            .destdir
            .join(relative.trim_start_matches('/'))
    }

    /// Run the whole plan. Halts at the first failure, leaving state
    /// records and logs behind for diagnosis and resumption.
    pub fn run(&self) -> Result<BuildOutcome, CoreError> {
        let dry = self.runner.is_dry_run();
        if !dry {
            for dir in [
                &self.folders.sources,
                &self.folders.components,
                &self.folders.deps,
                &self.folders.logs,
                &self.folders.state,
            ] {
                fs::create_dir_all(dir)?;
            }
        }

        let total = self.plan.modules.len();
        let mut built = Vec::new();
        let mut skipped = Vec::new();

        for (i, module) in self.plan.modules.iter().enumerate() {
            let counter = i + 1;

            if !dry
                && let Some(prev) = BuildState::load(&self.folders.state_file(&module.name))?
                && prev.is_complete()
            {
                info!("[{counter}/{total}] {} already built, skipping", module.name);
                skipped.push(module.name.clone());
                continue;
            }

            info!("[{counter}/{total}] building {}", module.name);
            self.build_module(module, counter)?;
            built.push(module.name.clone());
        }

        Ok(BuildOutcome {
            install_tree: self.install_tree(),
            built,
            skipped,
        })
    }

    fn build_module(&self, module: &ModuleSpec, counter: usize) -> Result<(), CoreError> {
        let dry = self.runner.is_dry_run();
        let version = &self.plan.version;
        let log = self.folders.log_file(counter, &module.name);

        let mut state = BuildState::new(&module.name);
        state.log_path = Some(log.clone());

        // Acquire
        self.transition(&mut state, Status::Downloading)?;
        let archive = self.folders.sources.join(module.archive_name(version));
        let url = module.source_url(version);
        if dry {
            self.runner
                .note(format!("Would download {url} -> {}", archive.display()));
        } else {
            self.checked(&mut state, fetch::download(&url, &archive, None))?;
        }

        // Extract
        self.transition(&mut state, Status::Extracting)?;
        let work = self.folders.component(&module.name);
        if dry {
            self.runner
                .note(format!("Would untar {} -> {}", archive.display(), work.display()));
        } else {
            self.checked(&mut state, fetch::unpack_tar_gz(&archive, &work))?;
        }

        // Native build steps
        for (status, request) in self.module_steps(module) {
            self.transition(&mut state, status)?;

            let output = match self.runner.run(&request) {
                Ok(output) => output,
                Err(err) => return Err(self.fail(&mut state, err)),
            };
            if !dry {
                append_log(&log, &request, &output)?;
            }
            if !output.success() {
                let err = CoreError::StepFailed {
                    module: module.name.clone(),
                    step: step_label(status).to_string(),
                    code: output.code,
                    log_tail: tail_of(&output),
                };
                return Err(self.fail(&mut state, err));
            }
        }

        if module.interpreter {
            self.finalize_interpreter(&mut state)?;
        }

        let root = if module.interpreter {
            self.install_tree()
        } else {
            self.folders.deps.clone()
        };
        state.artifact_paths = module.artifacts.iter().map(|a| root.join(a)).collect();
        self.transition(&mut state, Status::Done)?;
        Ok(())
    }

    /// The ordered native tool invocations for one module, with their
    /// lifecycle status.
    fn module_steps(&self, module: &ModuleSpec) -> Vec<(Status, StepRequest)> {
        let work = self.folders.component(&module.name);
        let cwd = match &module.build_cwd {
            Some(sub) => work.join(sub),
            None => work,
        };
        let env = self.step_env();
        let jobs = self.jobs();

        let step = |program: &str, args: Vec<String>| StepRequest {
            program: program.to_string(),
            args,
            cwd: cwd.clone(),
            env: env.clone(),
            timeout: self.options.step_timeout,
        };

        match &module.build_kind {
            BuildKind::Autotools => {
                let configure_args = if module.interpreter {
                    self.interpreter_configure_args()
                } else {
                    let mut args =
                        vec![format!("--prefix={}", self.folders.deps.display())];
                    args.extend(module.configure_args.iter().map(|a| self.expand(a)));
                    args
                };

                let install_args = if module.interpreter {
                    vec![
                        "install".to_string(),
                        format!("DESTDIR={}", self.folders.destdir.display()),
                    ]
                } else {
                    vec!["install".to_string()]
                };

                vec![
                    (Status::Configuring, step("./configure", configure_args)),
                    (Status::Compiling, step("make", vec![format!("-j{jobs}")])),
                    (Status::Installing, step("make", install_args)),
                ]
            }
            BuildKind::Custom { commands } => {
                let last = commands.len().saturating_sub(1);
                commands
                    .iter()
                    .enumerate()
                    .filter(|(_, cmd)| !cmd.is_empty())
                    .map(|(i, cmd)| {
                        let status = if i == last {
                            Status::Installing
                        } else if i == 0 {
                            Status::Configuring
                        } else {
                            Status::Compiling
                        };
                        let args = cmd[1..].iter().map(|a| self.expand(a)).collect();
                        (status, step(&cmd[0], args))
                    })
                    .collect()
            }
        }
    }

    /// Expand metadata placeholders in a build argument.
    fn expand(&self, arg: &str) -> String {
        arg.replace("{staging}", &self.folders.deps.display().to_string())
            .replace("{ssl_target}", ssl_target(self.plan.platform))
    }

    /// Configure flags for the interpreter, computed from the plan: the
    /// interpreter only gets pointed at modules that were actually staged.
    fn interpreter_configure_args(&self) -> Vec<String> {
        let mut args = vec![format!("--prefix={}", self.compiled_prefix())];

        if self.plan.contains("openssl") {
            args.push(format!("--with-openssl={}", self.folders.deps.display()));
        }

        let dbm: Vec<&str> = ["gdbm", "bdb"]
            .into_iter()
            .filter(|m| self.plan.contains(m))
            .collect();
        if !dbm.is_empty() {
            args.push(format!("--with-dbmliborder={}", dbm.join(":")));
        }

        if self.plan.version >= Version::new(3, 10, 0) {
            args.push("--disable-test-modules".to_string());
        }

        args.extend(
            self.plan
                .interpreter()
                .configure_args
                .iter()
                .map(|a| self.expand(a)),
        );
        args
    }

    /// Environment shared by every build step: the staging prefix comes
    /// first on every search path so staged modules shadow system ones.
    fn step_env(&self) -> Vec<(String, String)> {
        let deps = self.folders.deps.display();
        let inherited_path = std::env::var("PATH").unwrap_or_default();

        let mut env = vec![
            ("PATH".to_string(), format!("{deps}/bin:{inherited_path}")),
            ("CPATH".to_string(), format!("{deps}/include")),
            ("CFLAGS".to_string(), format!("-I{deps}/include")),
            ("LDFLAGS".to_string(), format!("-L{deps}/lib")),
            (
                "PKG_CONFIG_PATH".to_string(),
                format!("{deps}/lib/pkgconfig"),
            ),
        ];
        env.extend(build_env(self.plan.platform));
        env
    }

    fn jobs(&self) -> usize {
        self.options.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Post-install fixups that make the tree relocatable: scrub build
    /// paths out of installed text files, point rpaths at the bundled
    /// lib/ directory, add the conventional `python` name.
    fn finalize_interpreter(&self, state: &mut BuildState) -> Result<(), CoreError> {
        let install = self.install_tree();

        if self.runner.is_dry_run() {
            self.runner.note(format!(
                "Would scrub build paths from text files under {}",
                install.display()
            ));
            self.runner.note(format!(
                "Would point rpaths under {} at the bundled lib/",
                install.display()
            ));
            return Ok(());
        }

        self.checked(state, scrub_destdir_paths(&install, &self.folders.destdir))?;
        self.fix_rpaths(&install);

        #[cfg(unix)]
        {
            let python3 = install.join("bin/python3");
            let python = install.join("bin/python");
            if python3.exists() && !python.exists() {
                std::os::unix::fs::symlink("python3", &python)?;
            }
        }

        Ok(())
    }

    /// Rewrite rpaths on every installed binary so bundled shared objects
    /// resolve relative to the executable. Non-binary files (scripts in
    /// bin/) make the tool exit non-zero; that is expected and skipped.
    fn fix_rpaths(&self, install: &Path) {
        let env = self.step_env();
        for path in rpath_candidates(install) {
            let request = match self.plan.platform.os {
                Os::Linux => StepRequest {
                    program: "patchelf".to_string(),
                    args: vec![
                        "--set-rpath".to_string(),
                        "$ORIGIN/../lib".to_string(),
                        path.display().to_string(),
                    ],
                    cwd: install.to_path_buf(),
                    env: env.clone(),
                    timeout: self.options.step_timeout,
                },
                Os::Darwin => StepRequest {
                    program: "install_name_tool".to_string(),
                    args: vec![
                        "-add_rpath".to_string(),
                        "@executable_path/../lib".to_string(),
                        path.display().to_string(),
                    ],
                    cwd: install.to_path_buf(),
                    env: env.clone(),
                    timeout: self.options.step_timeout,
                },
            };
            match self.runner.run(&request) {
                Ok(output) if !output.success() => {
                    warn!(path = %path.display(), "rpath tool skipped file");
                }
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), %err, "rpath tool unavailable"),
            }
        }
    }

    /// Persist a status transition. Dry-runs narrate instead of writing.
    fn transition(&self, state: &mut BuildState, status: Status) -> Result<(), CoreError> {
        state.status = status;
        if !self.runner.is_dry_run() {
            state.save(&self.folders.state_file(&state.module))?;
        }
        Ok(())
    }

    /// Mark the module failed before surfacing an error from a non-step
    /// operation (download, extraction, file fixups).
    fn checked<T>(
        &self,
        state: &mut BuildState,
        result: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail(state, err)),
        }
    }

    fn fail(&self, state: &mut BuildState, err: CoreError) -> CoreError {
        state.status = Status::Failed;
        if !self.runner.is_dry_run()
            && let Err(save_err) = state.save(&self.folders.state_file(&state.module))
        {
            warn!(module = %state.module, %save_err, "could not persist failed state");
        }
        err
    }
}

fn step_label(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::Downloading => "download",
        Status::Extracting => "extract",
        Status::Configuring => "configure",
        Status::Compiling => "compile",
        Status::Installing => "install",
        Status::Done => "done",
        Status::Failed => "failed",
    }
}

/// Append one step's command line and captured output to the module log.
fn append_log(log: &Path, request: &StepRequest, output: &StepOutput) -> Result<(), CoreError> {
    if let Some(parent) = log.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(log)?;
    writeln!(file, "$ {}", request.rendered())?;
    file.write_all(output.stdout.as_bytes())?;
    file.write_all(output.stderr.as_bytes())?;
    writeln!(file, "[exit: {:?}]", output.code)?;
    Ok(())
}

/// Last lines of a step's combined output, for the error message.
fn tail_of(output: &StepOutput) -> String {
    let combined = format!("{}{}", output.stdout, output.stderr);
    let lines: Vec<&str> = combined.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}

/// Replace the absolute DESTDIR path in installed text files with the
/// compiled-in prefix, so no build-machine path leaks into the artifact.
/// Binary files (invalid UTF-8) are left alone; rpaths handle those.
fn scrub_destdir_paths(install: &Path, destdir: &Path) -> Result<(), CoreError> {
    let needle = destdir.display().to_string();
    for entry in walkdir::WalkDir::new(install)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(text) = fs::read_to_string(entry.path()) else {
            continue;
        };
        if text.contains(&needle) {
            fs::write(entry.path(), text.replace(&needle, ""))?;
        }
    }
    Ok(())
}

/// Files under the install tree that may carry an rpath: everything in
/// bin/ plus shared objects anywhere in the tree. Sorted for determinism.
fn rpath_candidates(install: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for entry in walkdir::WalkDir::new(install)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let in_bin = path.parent().and_then(|p| p.file_name()) == Some("bin".as_ref());
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let shared = name.contains(".so") || name.ends_with(".dylib");
        if in_bin || shared {
            candidates.push(path.to_path_buf());
        }
    }
    candidates
}

/// OpenSSL's `./Configure` target name for a platform.
fn ssl_target(platform: Platform) -> &'static str {
    match (platform.os, platform.arch) {
        (Os::Linux, Arch::X86_64) => "linux-x86_64",
        (Os::Linux, Arch::Aarch64) => "linux-aarch64",
        (Os::Darwin, Arch::X86_64) => "darwin64-x86_64-cc",
        (Os::Darwin, Arch::Aarch64) => "darwin64-arm64-cc",
    }
}
