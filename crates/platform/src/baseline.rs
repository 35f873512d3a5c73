//! Per-platform baseline shared-library allow-lists
//!
//! A library is "baseline" when it is guaranteed present on any system of
//! that platform: the C runtime, the dynamic linker itself, and (on macOS)
//! the OS frameworks. Anything a built interpreter links against that is
//! not on this list makes the build non-portable.

use crate::platform::Os;

/// Library name prefixes guaranteed present on any Linux system.
///
/// Matched against the soname (e.g. `libc.so.6`), not a full path.
const LINUX_BASELINE: &[&str] = &[
    "linux-vdso.so",
    "linux-gate.so",
    "ld-linux",
    "libc.so",
    "libm.so",
    "libdl.so",
    "libpthread.so",
    "librt.so",
    "libutil.so",
    "libcrypt.so",
    "libresolv.so",
    "libnsl.so",
];

/// Path prefixes guaranteed present on any macOS system.
///
/// Matched against the full install name reported by `otool -L`.
const DARWIN_BASELINE: &[&str] = &[
    "/usr/lib/libSystem",
    "/usr/lib/libc++",
    "/usr/lib/libobjc",
    "/usr/lib/libiconv",
    "/usr/lib/libz",
    "/usr/lib/libncurses",
    "/usr/lib/libedit",
    "/System/Library/Frameworks/",
];

/// The baseline allow-list for the given OS.
pub fn baseline_libs(os: Os) -> &'static [&'static str] {
    match os {
        Os::Linux => LINUX_BASELINE,
        Os::Darwin => DARWIN_BASELINE,
    }
}

/// Check whether a referenced library is part of the platform baseline.
///
/// On Linux the check is against the library's basename, so both `libc.so.6`
/// and `/lib/x86_64-linux-gnu/libc.so.6` are accepted. On macOS install
/// names are absolute paths and are matched as such.
pub fn is_baseline_lib(os: Os, reference: &str) -> bool {
    match os {
        Os::Linux => {
            let name = reference.rsplit('/').next().unwrap_or(reference);
            baseline_libs(os).iter().any(|p| name.starts_with(p))
        }
        Os::Darwin => baseline_libs(os).iter().any(|p| reference.starts_with(p)),
    }
}
