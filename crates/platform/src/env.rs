//! Platform-specific build environment variables

use tracing::debug;

use crate::platform::{Arch, Os, Platform};

/// Environment variables every native build step needs on this platform.
///
/// On macOS the deployment target must be pinned so the produced binaries
/// run on older systems than the build machine.
pub fn build_env(platform: Platform) -> Vec<(String, String)> {
    let mut env = Vec::new();

    if platform.os == Os::Darwin {
        let target = match platform.arch {
            // arm64 support starts at Big Sur
            Arch::Aarch64 => "11.0",
            Arch::X86_64 => "10.14",
        };
        debug!(target = %target, "pinning macOS deployment target");
        env.push(("MACOSX_DEPLOYMENT_TARGET".to_string(), target.to_string()));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_has_no_extra_env() {
        let env = build_env(Platform::new(Os::Linux, Arch::X86_64));
        assert!(env.is_empty());
    }

    #[test]
    fn test_darwin_pins_deployment_target() {
        let env = build_env(Platform::new(Os::Darwin, Arch::Aarch64));
        assert_eq!(
            env,
            vec![("MACOSX_DEPLOYMENT_TARGET".to_string(), "11.0".to_string())]
        );

        let env = build_env(Platform::new(Os::Darwin, Arch::X86_64));
        assert_eq!(env[0].1, "10.14");
    }
}
