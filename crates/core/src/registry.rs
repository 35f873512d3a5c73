//! Static module metadata and the module registry
//!
//! Every buildable unit (compression library, crypto library, the
//! interpreter itself) is described by a [`ModuleSpec`]: a closed,
//! schema-validated record the resolver can operate on. Specs are owned by
//! a [`Registry`] constructed once at startup and passed by reference into
//! the resolver; declaration order is preserved because it is the
//! deterministic tie-break for the build order.

use std::collections::HashMap;

use semver::Version;
use portapy_platform::{Os, Platform};

use crate::error::CoreError;

/// How a module's native build system is driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKind {
    /// Conventional `./configure && make && make install` flow.
    Autotools,
    /// Explicit command sequence for modules with non-autotools builds
    /// (bzip2's bare Makefile, openssl's `./Configure`).
    ///
    /// Arguments may contain the placeholders `{staging}` and
    /// `{ssl_target}`, expanded by the orchestrator.
    Custom { commands: Vec<Vec<String>> },
}

/// Platform applicability predicate, kept as a closed variant so module
/// metadata stays statically checkable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformMatch {
    Any,
    Only(Vec<Os>),
}

impl PlatformMatch {
    pub fn accepts(&self, platform: Platform) -> bool {
        match self {
            PlatformMatch::Any => true,
            PlatformMatch::Only(oses) => oses.contains(&platform.os),
        }
    }
}

/// Declarative metadata for one buildable unit. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    /// Pinned upstream version; `None` for the interpreter, whose version
    /// comes from the build request.
    pub version: Option<String>,
    /// Source tarball URL with a `{version}` placeholder.
    pub url_template: String,
    pub build_kind: BuildKind,
    /// Names of registry modules that must be staged before this one.
    pub dependencies: Vec<String>,
    pub configure_args: Vec<String>,
    /// Subdirectory of the unpacked source to run the build from.
    pub build_cwd: Option<String>,
    /// Files (relative to the staging prefix, or to the install tree for
    /// the interpreter) whose presence marks a completed build.
    pub artifacts: Vec<String>,
    /// Part of the auto-selected default set.
    pub default: bool,
    /// The mandatory interpreter module, always built last.
    pub interpreter: bool,
    pub platforms: PlatformMatch,
}

impl ModuleSpec {
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.accepts(platform)
    }

    /// The version this module builds at, given the requested interpreter
    /// version.
    pub fn resolved_version(&self, interpreter_version: &Version) -> String {
        match &self.version {
            Some(v) => v.clone(),
            None => interpreter_version.to_string(),
        }
    }

    /// The source tarball URL for this module.
    pub fn source_url(&self, interpreter_version: &Version) -> String {
        self.url_template
            .replace("{version}", &self.resolved_version(interpreter_version))
    }

    /// Cache file name in the downloads/sources directory, keyed by
    /// module name and version.
    pub fn archive_name(&self, interpreter_version: &Version) -> String {
        format!(
            "{}-{}.tar.gz",
            self.name,
            self.resolved_version(interpreter_version)
        )
    }
}

/// The process-wide set of known modules, indexed by name.
///
/// Not a global: constructed once (usually via [`Registry::builtin`]) and
/// passed by reference into the resolver.
#[derive(Debug, Clone)]
pub struct Registry {
    modules: Vec<ModuleSpec>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from explicit specs, validating the metadata:
    /// unique names, known dependency names, exactly one interpreter.
    pub fn from_modules(modules: Vec<ModuleSpec>) -> Result<Self, CoreError> {
        let mut index = HashMap::new();
        for (i, module) in modules.iter().enumerate() {
            if index.insert(module.name.clone(), i).is_some() {
                return Err(CoreError::InvalidRegistry(format!(
                    "duplicate module name '{}'",
                    module.name
                )));
            }
        }

        for module in &modules {
            for dep in &module.dependencies {
                if !index.contains_key(dep) {
                    return Err(CoreError::UnknownModule(dep.clone()));
                }
            }
        }

        let interpreters = modules.iter().filter(|m| m.interpreter).count();
        if interpreters != 1 {
            return Err(CoreError::InvalidRegistry(format!(
                "expected exactly one interpreter module, found {}",
                interpreters
            )));
        }

        Ok(Self { modules, index })
    }

    /// The built-in registry: the modules a portable CPython links against,
    /// plus the interpreter itself. Declaration order is the resolver's
    /// tie-break order.
    pub fn builtin() -> Self {
        let modules = builtin_modules();
        let index = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();
        Self { modules, index }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleSpec> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    pub fn require(&self, name: &str) -> Result<&ModuleSpec, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::UnknownModule(name.to_string()))
    }

    /// Declaration-order position, used as the deterministic tie-break.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The mandatory interpreter module.
    pub fn interpreter(&self) -> &ModuleSpec {
        // Guaranteed by construction in from_modules/builtin.
        self.modules
            .iter()
            .find(|m| m.interpreter)
            .unwrap_or(&self.modules[0])
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_modules() -> Vec<ModuleSpec> {
    let lib = |name: &str,
               version: &str,
               url: &str,
               args: &[&str],
               deps: &[&str],
               artifacts: &[&str]| ModuleSpec {
        name: name.to_string(),
        version: Some(version.to_string()),
        url_template: url.to_string(),
        build_kind: BuildKind::Autotools,
        dependencies: strings(deps),
        configure_args: strings(args),
        build_cwd: None,
        artifacts: strings(artifacts),
        default: true,
        interpreter: false,
        platforms: PlatformMatch::Any,
    };

    vec![
        lib(
            "zlib",
            "1.2.11",
            "https://zlib.net/zlib-{version}.tar.gz",
            &["--static"],
            &[],
            &["lib/libz.a"],
        ),
        lib(
            "bzip2",
            "1.0.8",
            "https://sourceware.org/pub/bzip2/bzip2-{version}.tar.gz",
            &[],
            &[],
            &["lib/libbz2.a"],
        ),
        lib(
            "xz",
            "5.2.5",
            "https://tukaani.org/xz/xz-{version}.tar.gz",
            &[
                "--disable-shared",
                "--disable-xz",
                "--disable-xzdec",
                "--disable-lzmadec",
                "--disable-lzmainfo",
                "--disable-scripts",
            ],
            &[],
            &["lib/liblzma.a"],
        ),
        lib(
            "libffi",
            "3.4.2",
            "https://github.com/libffi/libffi/releases/download/v{version}/libffi-{version}.tar.gz",
            &["--disable-shared", "--disable-docs"],
            &[],
            &["lib/libffi.a"],
        ),
        lib(
            "readline",
            "8.1",
            "https://ftp.gnu.org/gnu/readline/readline-{version}.tar.gz",
            &["--disable-shared", "--with-curses"],
            &[],
            &["lib/libreadline.a"],
        ),
        lib(
            "openssl",
            "1.1.1k",
            "https://www.openssl.org/source/openssl-{version}.tar.gz",
            &[],
            &["zlib"],
            &["lib/libssl.a", "lib/libcrypto.a"],
        ),
        lib(
            "sqlite",
            "3.36.0",
            "https://github.com/sqlite/sqlite/archive/refs/tags/version-{version}.tar.gz",
            &["--disable-shared"],
            &[],
            &["lib/libsqlite3.a"],
        ),
        lib(
            "gdbm",
            "1.18.1",
            "https://ftp.gnu.org/gnu/gdbm/gdbm-{version}.tar.gz",
            &["--disable-shared", "--enable-libgdbm-compat"],
            &[],
            &["lib/libgdbm.a"],
        ),
        lib(
            "bdb",
            "6.2.32",
            "https://ftp.osuosl.org/pub/blfs/conglomeration/db/db-{version}.tar.gz",
            &[],
            &[],
            &["lib/libdb.a"],
        ),
        lib(
            "uuid",
            "1.0.3",
            "https://sourceforge.net/projects/libuuid/files/libuuid-{version}.tar.gz",
            &["--disable-shared"],
            &[],
            &["lib/libuuid.a"],
        ),
        ModuleSpec {
            name: "cpython".to_string(),
            version: None,
            url_template: "https://github.com/python/cpython/archive/refs/tags/v{version}.tar.gz"
                .to_string(),
            build_kind: BuildKind::Autotools,
            dependencies: Vec::new(),
            configure_args: Vec::new(),
            build_cwd: None,
            artifacts: strings(&["bin/python3"]),
            default: true,
            interpreter: true,
            platforms: PlatformMatch::Any,
        },
    ]
    .into_iter()
    .map(|mut m| {
        // Platform and build-system exceptions to the uniform shape above.
        match m.name.as_str() {
            // bzip2 has no configure script, just a Makefile with PREFIX=
            "bzip2" => {
                m.build_kind = BuildKind::Custom {
                    commands: vec![strings(&["make", "install", "PREFIX={staging}"])],
                };
            }
            // openssl drives its own Configure with a platform target
            "openssl" => {
                m.build_kind = BuildKind::Custom {
                    commands: vec![
                        strings(&[
                            "./Configure",
                            "--prefix={staging}",
                            "--openssldir=/etc/ssl",
                            "{ssl_target}",
                            "no-shared",
                        ]),
                        strings(&["make"]),
                        strings(&["make", "install_sw"]),
                    ],
                };
            }
            // bdb's configure lives in dist/, run from build_unix/
            "bdb" => {
                m.build_kind = BuildKind::Custom {
                    commands: vec![
                        strings(&[
                            "../dist/configure",
                            "--prefix={staging}",
                            "--enable-dbm",
                            "--disable-shared",
                        ]),
                        strings(&["make"]),
                        strings(&["make", "install"]),
                    ],
                };
                m.build_cwd = Some("build_unix".to_string());
                // Heavyweight and redundant with gdbm: explicit selection only.
                m.default = false;
            }
            // libuuid only builds (and is only needed) on linux
            "uuid" => {
                m.platforms = PlatformMatch::Only(vec![Os::Linux]);
            }
            _ => {}
        }
        m
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use portapy_platform::Arch;

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X86_64)
    }

    fn darwin() -> Platform {
        Platform::new(Os::Darwin, Arch::Aarch64)
    }

    #[test]
    fn builtin_registry_is_valid() {
        // from_modules applies full schema validation to the builtin data
        let registry = Registry::from_modules(builtin_modules()).unwrap();
        assert!(registry.get("zlib").is_some());
        assert!(registry.get("cpython").is_some());
        assert!(registry.interpreter().interpreter);
    }

    #[test]
    fn unknown_module_lookup() {
        let registry = Registry::builtin();
        assert!(registry.get("ncurses").is_none());
        assert!(matches!(
            registry.require("ncurses"),
            Err(CoreError::UnknownModule(_))
        ));
    }

    #[test]
    fn declaration_order_is_stable() {
        let registry = Registry::builtin();
        let zlib = registry.position("zlib").unwrap();
        let openssl = registry.position("openssl").unwrap();
        let cpython = registry.position("cpython").unwrap();
        assert!(zlib < openssl);
        assert!(openssl < cpython);
    }

    #[test]
    fn platform_predicates() {
        let registry = Registry::builtin();
        let uuid = registry.get("uuid").unwrap();
        assert!(uuid.supports(linux()));
        assert!(!uuid.supports(darwin()));
        assert!(registry.get("zlib").unwrap().supports(darwin()));
    }

    #[test]
    fn url_templating() {
        let registry = Registry::builtin();
        let version = Version::new(3, 12, 6);

        let zlib = registry.get("zlib").unwrap();
        assert_eq!(zlib.source_url(&version), "https://zlib.net/zlib-1.2.11.tar.gz");
        assert_eq!(zlib.archive_name(&version), "zlib-1.2.11.tar.gz");

        let cpython = registry.get("cpython").unwrap();
        assert_eq!(
            cpython.source_url(&version),
            "https://github.com/python/cpython/archive/refs/tags/v3.12.6.tar.gz"
        );
        assert_eq!(cpython.archive_name(&version), "cpython-3.12.6.tar.gz");
    }

    #[test]
    fn from_modules_rejects_unknown_dependency() {
        let mut modules = builtin_modules();
        modules[0].dependencies.push("nonexistent".to_string());
        assert!(matches!(
            Registry::from_modules(modules),
            Err(CoreError::UnknownModule(_))
        ));
    }

    #[test]
    fn from_modules_rejects_duplicate_names() {
        let mut modules = builtin_modules();
        let dup = modules[0].clone();
        modules.push(dup);
        match Registry::from_modules(modules) {
            Err(CoreError::InvalidRegistry(msg)) => assert!(msg.contains("duplicate")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn from_modules_requires_exactly_one_interpreter() {
        let mut modules = builtin_modules();
        modules.retain(|m| !m.interpreter);
        assert!(matches!(
            Registry::from_modules(modules),
            Err(CoreError::InvalidRegistry(_))
        ));

        let mut modules = builtin_modules();
        modules[0].interpreter = true;
        assert!(matches!(
            Registry::from_modules(modules),
            Err(CoreError::InvalidRegistry(_))
        ));
    }
}
