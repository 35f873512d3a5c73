//! Distribution artifact packaging
//!
//! The finished install tree becomes one tar.gz named by family, version
//! and platform triple. The archive keeps the version-named top-level
//! folder so an unpack lands a `<version>/bin/python3` layout matching
//! the compiled-in prefix.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use semver::Version;
use tracing::info;

use portapy_platform::Platform;

use crate::error::CoreError;

/// Archive file name for one build.
pub fn artifact_name(family: &str, version: &Version, platform: Platform) -> String {
    format!("{family}-{version}-{platform}.tar.gz")
}

/// Pack the install tree into `dist/`, returning the artifact path.
pub fn package(
    install_tree: &Path,
    dist: &Path,
    family: &str,
    version: &Version,
    platform: Platform,
) -> Result<PathBuf, CoreError> {
    fs::create_dir_all(dist)?;
    let artifact = dist.join(artifact_name(family, version, platform));

    let file = File::create(&artifact)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(version.to_string(), install_tree)?;
    builder.into_inner()?.finish()?;

    info!("Packaged {}", artifact.display());
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    use portapy_platform::{Arch, Os};

    #[test]
    fn artifact_is_named_by_family_version_platform() {
        assert_eq!(
            artifact_name(
                "cpython",
                &Version::new(3, 12, 6),
                Platform::new(Os::Linux, Arch::X86_64)
            ),
            "cpython-3.12.6-linux-x86_64.tar.gz"
        );
    }

    #[test]
    fn archive_keeps_the_versioned_top_level_folder() {
        let temp = TempDir::new().unwrap();
        let tree = temp.path().join("3.12.6");
        fs::create_dir_all(tree.join("bin")).unwrap();
        fs::write(tree.join("bin/python3"), b"\x7fELF").unwrap();

        let artifact = package(
            &tree,
            &temp.path().join("dist"),
            "cpython",
            &Version::new(3, 12, 6),
            Platform::new(Os::Linux, Arch::X86_64),
        )
        .unwrap();
        assert!(artifact.ends_with("dist/cpython-3.12.6-linux-x86_64.tar.gz"));

        let mut names = Vec::new();
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&artifact).unwrap()));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            names.push(entry.path().unwrap().display().to_string());
        }
        assert!(names.iter().all(|n| n.starts_with("3.12.6")));
        assert!(names.iter().any(|n| n == "3.12.6/bin/python3"));

        // Contents survive the round trip.
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&artifact).unwrap()));
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("bin/python3") {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                assert_eq!(data, b"\x7fELF");
            }
        }
    }
}
