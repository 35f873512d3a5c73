//! Portability inspection
//!
//! Walks a finished installation tree, lists every binary's dynamic-library
//! references through the platform's introspection tool, classifies each
//! against the platform baseline allow-list and aggregates a pass/fail
//! report. Strictly read-only: an inspection never mutates the tree.

mod lister;
mod report;

pub use lister::{LddLister, LibRef, OtoolLister, PlatformLister, SharedLibLister, lister_for};
pub use report::{DependencyRecord, LibClass, PortabilityReport};

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use portapy_platform::{Platform, is_baseline_lib};

use crate::error::CoreError;

/// Inspect one installation tree (or a single binary) for portability.
///
/// Binaries the introspection tool cannot parse are recorded as
/// `unresolved` rather than aborting the scan. The walk is sequential and
/// sorted so the record order is deterministic.
pub fn inspect_tree(
    root: &Path,
    platform: Platform,
    lister: &dyn SharedLibLister,
) -> Result<PortabilityReport, CoreError> {
    let mut records = Vec::new();

    for binary in scan_targets(root) {
        let relative = binary.strip_prefix(root).unwrap_or(&binary).to_path_buf();
        debug!(binary = %relative.display(), "inspecting");

        let refs = match lister.list_dependencies(&binary) {
            Ok(refs) => refs,
            Err(err) => {
                warn!(binary = %relative.display(), %err, "could not introspect binary");
                records.push(DependencyRecord {
                    binary: relative,
                    library: binary
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    resolved_path: None,
                    classification: LibClass::Unresolved,
                });
                continue;
            }
        };

        for lib in refs {
            let classification = classify(platform, &lib);
            records.push(DependencyRecord {
                binary: relative.clone(),
                library: lib.name,
                resolved_path: lib.path,
                classification,
            });
        }
    }

    Ok(PortabilityReport::new(
        root.to_path_buf(),
        platform.to_string(),
        records,
    ))
}

fn classify(platform: Platform, lib: &LibRef) -> LibClass {
    // On macOS install names are full paths; match those when present.
    let reference = match &lib.path {
        Some(path) => path.display().to_string(),
        None => lib.name.clone(),
    };
    if is_baseline_lib(platform.os, &reference) || is_baseline_lib(platform.os, &lib.name) {
        LibClass::SystemBaseline
    } else if lib.path.is_none() {
        LibClass::Unresolved
    } else {
        LibClass::External
    }
}

/// Everything worth introspecting: executables plus loadable shared
/// objects. A single-file root is inspected as-is.
fn scan_targets(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut targets = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_shared_object(path) || is_executable(path) {
            targets.push(path.to_path_buf());
        }
    }
    targets
}

fn is_shared_object(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.ends_with(".dylib") || name.ends_with(".so") || name.contains(".so.")
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use portapy_platform::{Arch, Os};

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    /// Canned per-binary results, recording which binaries were queried.
    #[derive(Default)]
    struct FakeLister {
        refs: HashMap<String, Vec<LibRef>>,
        unparsable: Vec<String>,
        queried: Mutex<Vec<String>>,
    }

    impl FakeLister {
        fn with(mut self, file_name: &str, refs: Vec<LibRef>) -> Self {
            self.refs.insert(file_name.to_string(), refs);
            self
        }

        fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    impl SharedLibLister for FakeLister {
        fn list_dependencies(&self, binary: &Path) -> Result<Vec<LibRef>, CoreError> {
            let name = binary.file_name().unwrap().to_string_lossy().into_owned();
            self.queried.lock().unwrap().push(name.clone());
            if self.unparsable.contains(&name) {
                return Err(CoreError::CommandFailed {
                    program: format!("ldd {name}"),
                    code: Some(1),
                });
            }
            Ok(self.refs.get(&name).cloned().unwrap_or_default())
        }
    }

    fn libref(name: &str, path: Option<&str>) -> LibRef {
        LibRef {
            name: name.to_string(),
            path: path.map(PathBuf::from),
        }
    }

    /// A plausible install tree: one executable, one extension module,
    /// one plain source file that must be ignored.
    fn fake_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("lib/python3.12/lib-dynload")).unwrap();

        fs::write(root.join("bin/python3"), b"\x7fELF").unwrap();
        fs::write(
            root.join("lib/python3.12/lib-dynload/_ssl.cpython-312-x86_64-linux-gnu.so"),
            b"\x7fELF",
        )
        .unwrap();
        fs::write(root.join("lib/python3.12/os.py"), b"import abc\n").unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                root.join("bin/python3"),
                fs::Permissions::from_mode(0o755),
            )
            .unwrap();
        }

        temp
    }

    #[test]
    fn baseline_only_tree_is_portable() {
        let temp = fake_tree();
        let lister = FakeLister::default().with(
            "python3",
            vec![
                libref("libc.so.6", Some("/lib/x86_64-linux-gnu/libc.so.6")),
                libref("linux-vdso.so.1", None),
            ],
        );

        let report = inspect_tree(temp.path(), linux(), &lister).unwrap();
        assert!(report.portable);
        assert!(
            report
                .records
                .iter()
                .all(|r| r.classification == LibClass::SystemBaseline)
        );
    }

    #[test]
    fn external_library_fails_the_verdict_by_name() {
        let temp = fake_tree();
        let lister = FakeLister::default().with(
            "python3",
            vec![
                libref("libc.so.6", Some("/lib/x86_64-linux-gnu/libc.so.6")),
                libref("libssl.so.1.1", Some("/usr/lib/libssl.so.1.1")),
            ],
        );

        let report = inspect_tree(temp.path(), linux(), &lister).unwrap();
        assert!(!report.portable);

        let offending: Vec<_> = report.offending().collect();
        assert_eq!(offending.len(), 1);
        assert_eq!(offending[0].library, "libssl.so.1.1");
        assert_eq!(offending[0].classification, LibClass::External);
    }

    #[test]
    fn not_found_library_is_unresolved() {
        let temp = fake_tree();
        let lister =
            FakeLister::default().with("python3", vec![libref("libmystery.so.9", None)]);

        let report = inspect_tree(temp.path(), linux(), &lister).unwrap();
        assert!(!report.portable);
        assert_eq!(report.records[0].classification, LibClass::Unresolved);
    }

    #[test]
    fn scan_covers_executables_and_extensions_only() {
        let temp = fake_tree();
        let lister = FakeLister::default();
        inspect_tree(temp.path(), linux(), &lister).unwrap();

        let queried = lister.queried();
        assert!(queried.contains(&"python3".to_string()));
        assert!(queried.contains(&"_ssl.cpython-312-x86_64-linux-gnu.so".to_string()));
        assert!(!queried.iter().any(|q| q.ends_with(".py")));
    }

    #[test]
    fn unparsable_binary_is_recorded_not_fatal() {
        let temp = fake_tree();
        let lister = FakeLister {
            unparsable: vec!["python3".to_string()],
            ..FakeLister::default()
        };

        let report = inspect_tree(temp.path(), linux(), &lister).unwrap();
        assert!(!report.portable);
        let unresolved: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.classification == LibClass::Unresolved)
            .collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].library, "python3");
    }

    #[test]
    fn single_file_root_is_inspected_directly() {
        let temp = fake_tree();
        let lister = FakeLister::default().with(
            "python3",
            vec![libref("libc.so.6", Some("/lib/x86_64-linux-gnu/libc.so.6"))],
        );

        let report =
            inspect_tree(&temp.path().join("bin/python3"), linux(), &lister).unwrap();
        assert!(report.portable);
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn records_are_relative_to_the_root() {
        let temp = fake_tree();
        let lister = FakeLister::default().with(
            "python3",
            vec![libref("libc.so.6", Some("/lib/x86_64-linux-gnu/libc.so.6"))],
        );

        let report = inspect_tree(temp.path(), linux(), &lister).unwrap();
        assert_eq!(report.records[0].binary, Path::new("bin/python3"));
    }
}
