//! Next-version computation for emitted packages.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use log::debug;
use semver::{BuildMetadata, Prerelease, Version};

use super::VersionSource;
use crate::error::BuildError;

/// Baseline used for packages that were never published.
pub const UNPUBLISHED_VERSION: &str = "0.0.0";

/// Which part of the version to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseType {
    #[default]
    Major,
    Minor,
    Patch,
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseType::Major => write!(f, "major"),
            ReleaseType::Minor => write!(f, "minor"),
            ReleaseType::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for ReleaseType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(ReleaseType::Major),
            "minor" => Ok(ReleaseType::Minor),
            "patch" => Ok(ReleaseType::Patch),
            _ => anyhow::bail!(
                "Unknown release type: {}. Expected major, minor, or patch.",
                s
            ),
        }
    }
}

/// Increment `version` the way `npm version <release>` does.
///
/// A pre-release of the target version is promoted instead of skipped:
/// `2.0.0-beta.1` bumped by major is `2.0.0`.
/// Returns `None` if `version` is not valid semver.
pub fn bump(version: &str, release: ReleaseType) -> Option<String> {
    let mut v = Version::parse(version.trim().trim_start_matches('v')).ok()?;
    let is_pre = !v.pre.is_empty();

    match release {
        ReleaseType::Major => {
            if !(is_pre && v.minor == 0 && v.patch == 0) {
                v.major += 1;
            }
            v.minor = 0;
            v.patch = 0;
        }
        ReleaseType::Minor => {
            if !(is_pre && v.patch == 0) {
                v.minor += 1;
            }
            v.patch = 0;
        }
        ReleaseType::Patch => {
            if !is_pre {
                v.patch += 1;
            }
        }
    }

    v.pre = Prerelease::EMPTY;
    v.build = BuildMetadata::EMPTY;
    Some(v.to_string())
}

/// Query the last published version of `name` and bump it.
///
/// A package that was never published starts from `0.0.0`. Every other
/// failure surfaces as [`BuildError::VersionLookupFailure`].
#[tracing::instrument(skip(source))]
pub async fn next_version<V: VersionSource + ?Sized>(
    source: &V,
    name: &str,
    release: ReleaseType,
) -> Result<String> {
    let last = match source.last_version(name).await {
        Ok(last) => last.unwrap_or_else(|| UNPUBLISHED_VERSION.to_string()),
        Err(e) if e.downcast_ref::<BuildError>().is_some() => return Err(e),
        Err(e) => {
            return Err(BuildError::VersionLookupFailure {
                name: name.to_string(),
                reason: format!("{:#}", e),
            }
            .into());
        }
    };

    let next = bump(&last, release).ok_or_else(|| BuildError::VersionLookupFailure {
        name: name.to_string(),
        reason: format!("`{}` is not a valid version", last),
    })?;

    debug!("{}: {} -> {} ({})", name, last, next, release);
    Ok(next)
}
