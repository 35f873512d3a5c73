//! Platform-native shared-library introspection
//!
//! One implementation per platform family (`ldd` on linux, `otool -L` on
//! macOS), both driven through the same [`ProcessRunner`] as build steps
//! so the scan logic is testable with canned tool output.

use std::path::{Path, PathBuf};

use portapy_platform::Os;

use crate::error::CoreError;
use crate::runner::{ProcessRunner, StepRequest};

/// One dynamic-library reference extracted from a binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibRef {
    pub name: String,
    /// Where the dynamic linker resolved it, when it could.
    pub path: Option<PathBuf>,
}

/// Enumerates the shared libraries a binary references.
pub trait SharedLibLister {
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<LibRef>, CoreError>;
}

/// `ldd`-backed lister for linux.
pub struct LddLister<'a, R: ProcessRunner> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner> LddLister<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }
}

impl<R: ProcessRunner> SharedLibLister for LddLister<'_, R> {
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<LibRef>, CoreError> {
        let output = self.runner.run(&introspect_request("ldd", binary))?;

        // ldd exits non-zero for scripts and static binaries; neither has
        // dynamic dependencies.
        if !output.success() {
            let combined = format!("{}{}", output.stdout, output.stderr);
            if combined.contains("not a dynamic executable")
                || combined.contains("statically linked")
            {
                return Ok(Vec::new());
            }
            return Err(CoreError::CommandFailed {
                program: format!("ldd {}", binary.display()),
                code: output.code,
            });
        }

        Ok(parse_ldd(&output.stdout))
    }
}

/// `otool -L`-backed lister for macOS.
pub struct OtoolLister<'a, R: ProcessRunner> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner> OtoolLister<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }
}

impl<R: ProcessRunner> SharedLibLister for OtoolLister<'_, R> {
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<LibRef>, CoreError> {
        let mut request = introspect_request("otool", binary);
        request.args.insert(0, "-L".to_string());
        let output = self.runner.run(&request)?;

        if !output.success() {
            let combined = format!("{}{}", output.stdout, output.stderr);
            if combined.contains("is not an object file") {
                return Ok(Vec::new());
            }
            return Err(CoreError::CommandFailed {
                program: format!("otool -L {}", binary.display()),
                code: output.code,
            });
        }

        Ok(parse_otool(&output.stdout))
    }
}

/// The right lister for a platform family, dispatched statically.
pub enum PlatformLister<'a, R: ProcessRunner> {
    Ldd(LddLister<'a, R>),
    Otool(OtoolLister<'a, R>),
}

impl<R: ProcessRunner> SharedLibLister for PlatformLister<'_, R> {
    fn list_dependencies(&self, binary: &Path) -> Result<Vec<LibRef>, CoreError> {
        match self {
            PlatformLister::Ldd(lister) => lister.list_dependencies(binary),
            PlatformLister::Otool(lister) => lister.list_dependencies(binary),
        }
    }
}

pub fn lister_for<R: ProcessRunner>(os: Os, runner: &R) -> PlatformLister<'_, R> {
    match os {
        Os::Linux => PlatformLister::Ldd(LddLister::new(runner)),
        Os::Darwin => PlatformLister::Otool(OtoolLister::new(runner)),
    }
}

fn introspect_request(program: &str, binary: &Path) -> StepRequest {
    StepRequest {
        program: program.to_string(),
        args: vec![binary.display().to_string()],
        cwd: binary
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        env: Vec::new(),
        timeout: None,
    }
}

/// Parse `ldd` output lines:
///
/// ```text
///     linux-vdso.so.1 (0x00007ffd...)
///     libz.so.1 => /lib/x86_64-linux-gnu/libz.so.1 (0x00007f...)
///     libmystery.so.9 => not found
///     /lib64/ld-linux-x86-64.so.2 (0x00007f...)
/// ```
fn parse_ldd(stdout: &str) -> Vec<LibRef> {
    let mut refs = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.contains("statically linked") {
            continue;
        }

        if let Some((name, target)) = line.split_once(" => ") {
            let target = target.trim();
            let path = if target.starts_with("not found") {
                None
            } else {
                Some(PathBuf::from(strip_load_address(target)))
            };
            refs.push(LibRef {
                name: name.trim().to_string(),
                path,
            });
            continue;
        }

        // Bare entries: the vdso and the dynamic linker itself.
        let token = strip_load_address(line);
        if token.is_empty() {
            continue;
        }
        let path = token.starts_with('/').then(|| PathBuf::from(token));
        let name = Path::new(token)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| token.to_string());
        refs.push(LibRef { name, path });
    }
    refs
}

/// Parse `otool -L` output: the first line names the binary, every
/// following line is an install name plus version info.
fn parse_otool(stdout: &str) -> Vec<LibRef> {
    let mut refs = Vec::new();
    for line in stdout.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let token = strip_load_address(line);
        if token.is_empty() {
            continue;
        }
        let path = token.starts_with('/').then(|| PathBuf::from(token));
        let name = Path::new(token)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| token.to_string());
        refs.push(LibRef { name, path });
    }
    refs
}

/// Drop the trailing " (...)" load address / version annotation.
fn strip_load_address(token: &str) -> &str {
    match token.split_once(" (") {
        Some((head, _)) => head.trim(),
        None => token.trim(),
    }
}
