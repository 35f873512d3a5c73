//! Supported interpreter versions
//!
//! Only a handful of recent non-EOL CPython versions are tracked, by
//! design. Older or EOL-ed versions get removed from this list without
//! notice; the set is static per release of this tool.

use semver::Version;

use crate::error::CoreError;

/// Supported CPython versions, newest first.
pub const SUPPORTED_VERSIONS: &[&str] = &["3.12.6", "3.11.10", "3.10.15", "3.9.20"];

/// The interpreter family currently modeled.
pub const FAMILY: &str = "cpython";

/// Latest supported version.
pub fn latest() -> Version {
    // SUPPORTED_VERSIONS entries are valid by construction (covered by test)
    SUPPORTED_VERSIONS[0]
        .parse()
        .unwrap_or_else(|_| Version::new(3, 12, 6))
}

/// Parse a requested version string.
///
/// A full `major.minor.patch` version is required: "3.12" is not good
/// enough to pin a reproducible source tarball.
pub fn parse_version(given: &str) -> Result<Version, CoreError> {
    if given.is_empty() || given == "latest" {
        return Ok(latest());
    }

    let version: Version = given.parse().map_err(|e: semver::Error| CoreError::InvalidVersion {
        given: given.to_string(),
        reason: e.to_string(),
    })?;

    if given.split('.').count() < 3 {
        return Err(CoreError::InvalidVersion {
            given: given.to_string(),
            reason: "full major.minor.patch version required".to_string(),
        });
    }

    Ok(version)
}

/// Whether this exact version is on the supported list.
pub fn is_supported(version: &Version) -> bool {
    SUPPORTED_VERSIONS
        .iter()
        .any(|s| s.parse::<Version>().map(|v| &v == version).unwrap_or(false))
}
