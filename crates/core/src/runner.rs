//! Synchronous process-step abstraction
//!
//! Every native build tool invocation goes through [`ProcessRunner`]: a
//! blocking call with captured stdout/stderr and an injectable timeout.
//! The orchestrator is tested against fake runners; the real
//! [`ExecRunner`] shells out, and [`DryRunRunner`] records what would run
//! without touching the system.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::CoreError;

/// One native build tool invocation.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Environment variables set on top of the inherited environment.
    /// The orchestrator computes PATH/CPATH/LDFLAGS here.
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl StepRequest {
    /// Human-readable rendering, used for logs and dry-run narration.
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        format!("cd {} && {}", self.cwd.display(), parts.join(" "))
    }
}

/// Captured output of a completed step.
///
/// A non-zero exit is not an `Err`: the caller decides what a failure
/// means and gets the captured output either way (for log tails).
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Default for StepOutput {
    fn default() -> Self {
        Self {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Blocking process execution with captured output.
///
/// The return contract from the invoked tool is conventional: exit code 0
/// = success, anything else = failure. `Err` is reserved for the step
/// itself going wrong (program missing, timeout).
pub trait ProcessRunner {
    fn run(&self, request: &StepRequest) -> Result<StepOutput, CoreError>;

    /// Dry-run runners replace execution with narration; the orchestrator
    /// checks this before any filesystem or network mutation.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Narrate a non-command action ("Would download ...", "Would untar
    /// ..."). Real runners just log it.
    fn note(&self, line: String) {
        debug!("{line}");
    }
}

/// The real runner: spawns the process, drains both pipes on threads so
/// chatty build tools cannot deadlock on a full pipe, and enforces the
/// optional timeout by polling.
#[derive(Debug, Default)]
pub struct ExecRunner;

impl ProcessRunner for ExecRunner {
    fn run(&self, request: &StepRequest) -> Result<StepOutput, CoreError> {
        debug!(cmd = %request.rendered(), "spawning process");

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| CoreError::CommandFailed {
            program: format!("{}: {}", request.program, e),
            code: None,
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_thread = std::thread::spawn(move || drain(stdout_pipe));
        let stderr_thread = std::thread::spawn(move || drain(stderr_pipe));

        let status = match request.timeout {
            None => child.wait()?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        child.kill().ok();
                        child.wait().ok();
                        return Err(CoreError::StepTimedOut {
                            program: request.program.clone(),
                            seconds: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        Ok(StepOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_string(&mut buf).ok();
    }
    buf
}

/// Replaces every invocation with a "Would run: ..." line. Output is
/// deterministic so two dry-runs of the same plan can be diffed.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    lines: Mutex<Vec<String>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ProcessRunner for DryRunRunner {
    fn run(&self, request: &StepRequest) -> Result<StepOutput, CoreError> {
        self.note(format!("Would run: {}", request.rendered()));
        Ok(StepOutput::default())
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    fn note(&self, line: String) {
        info!("{line}");
        println!("{line}");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}
