//! Build directory layout
//!
//! Everything a build touches lives under one build root:
//!
//! ```text
//! <root>/build/sources/              download cache, shared across versions
//! <root>/build/<version>/components/<name>   per-module work dirs
//! <root>/build/<version>/deps/       shared staging prefix
//! <root>/build/<version>/logs/       per-module logs, in build order
//! <root>/build/<version>/state/      per-module build-state records
//! <root>/build/<version>/<version>/  final install tree
//! <root>/dist/                       distribution artifacts
//! ```
//!
//! Concurrent builds must use distinct build roots; within one root the
//! orchestrator is the single writer.

use std::path::{Path, PathBuf};

use semver::Version;

/// Resolved filesystem layout for one build invocation.
#[derive(Debug, Clone)]
pub struct Folders {
    pub base: PathBuf,
    /// Download cache, keyed by module name + version.
    pub sources: PathBuf,
    /// Per-module source/work directories.
    pub components: PathBuf,
    /// Shared staging prefix all modules install into.
    pub deps: PathBuf,
    pub logs: PathBuf,
    pub state: PathBuf,
    /// DESTDIR passed to the interpreter's `make install`.
    pub destdir: PathBuf,
    /// Final install tree, named by interpreter version.
    pub install: PathBuf,
    pub dist: PathBuf,
}

impl Folders {
    pub fn new(base: &Path, version: &Version) -> Self {
        let build = base.join("build");
        let versioned = build.join(version.to_string());
        Self {
            base: base.to_path_buf(),
            sources: build.join("sources"),
            components: versioned.join("components"),
            deps: versioned.join("deps"),
            logs: versioned.join("logs"),
            state: versioned.join("state"),
            destdir: versioned.clone(),
            install: versioned.join(version.to_string()),
            dist: base.join("dist"),
        }
    }

    /// Work directory for one module's unpacked source.
    pub fn component(&self, name: &str) -> PathBuf {
        self.components.join(name)
    }

    /// Log file for the Nth built module; the counter prefix keeps log
    /// files sorted in build order.
    pub fn log_file(&self, counter: usize, name: &str) -> PathBuf {
        self.logs.join(format!("{:02}-{}.log", counter, name))
    }

    /// Build-state record for a module.
    pub fn state_file(&self, name: &str) -> PathBuf {
        self.state.join(format!("{name}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_versioned() {
        let folders = Folders::new(Path::new("/work"), &Version::new(3, 12, 6));
        assert_eq!(folders.sources, Path::new("/work/build/sources"));
        assert_eq!(folders.deps, Path::new("/work/build/3.12.6/deps"));
        assert_eq!(folders.install, Path::new("/work/build/3.12.6/3.12.6"));
        assert_eq!(folders.dist, Path::new("/work/dist"));
    }

    #[test]
    fn log_files_sort_in_build_order() {
        let folders = Folders::new(Path::new("/work"), &Version::new(3, 12, 6));
        let first = folders.log_file(1, "zlib");
        let second = folders.log_file(2, "openssl");
        assert!(first.file_name().unwrap() < second.file_name().unwrap());
        assert_eq!(first, Path::new("/work/build/3.12.6/logs/01-zlib.log"));
    }

    #[test]
    fn state_file_named_after_module() {
        let folders = Folders::new(Path::new("/work"), &Version::new(3, 12, 6));
        assert_eq!(
            folders.state_file("openssl"),
            Path::new("/work/build/3.12.6/state/openssl.json")
        );
    }
}
