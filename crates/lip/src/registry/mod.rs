//! Tooth registries
//!
//! A registry lists the published versions of a repo and hands out archive
//! files for them. [`GoModuleProxy`] talks to a `GOPROXY` server; tests use
//! in-memory implementations.

mod api;
mod goproxy;

pub use api::{escape_module_path, parse_version_list, version_list_url, zip_url};
pub use goproxy::{GoModuleProxy, DEFAULT_GO_MODULE_PROXY};

use crate::archive::{Archive, ArchiveError};
use crate::cache::CacheError;
use crate::semver::{Version, VersionRange};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Cannot get {url} (HTTP {status})")]
    BadStatus { url: String, status: u16 },

    /// Version not found
    #[error("Version {version} not found for tooth {repo}")]
    VersionNotFound { repo: String, version: String },

    #[error("No available version found for {repo} matching {range}")]
    NoMatchingVersion { repo: String, range: String },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),

    #[error("Failed to open archive: {0}")]
    ArchiveError(#[from] ArchiveError),

    /// The archive's own manifest names another tooth or version
    #[error("Archive {path} contains {found}, but {expected} was requested")]
    IdentityMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Source of tooth versions and archives
pub trait Registry {
    /// All published versions of `repo`, in no particular order
    fn list_versions(&self, repo: &str) -> Result<Vec<Version>, RegistryError>;

    /// Local path of the archive for `repo@version`, downloading it if needed
    fn fetch_archive(&self, repo: &str, version: &Version) -> Result<PathBuf, RegistryError>;
}

/// Greatest version matching `range`, preferring stable versions
///
/// Pre-releases are only considered when no stable version matches.
pub fn select_latest(versions: &[Version], range: &VersionRange) -> Option<Version> {
    let matching = versions.iter().filter(|v| range.matches(v));

    let stable = matching.clone().filter(|v| v.is_stable()).max();
    stable.or_else(|| matching.max()).cloned()
}

/// Latest published version of `repo`
pub fn latest_version(registry: &dyn Registry, repo: &str) -> Result<Version, RegistryError> {
    latest_version_in_range(registry, repo, &VersionRange::any())
}

/// Latest published version of `repo` matching `range`
pub fn latest_version_in_range(
    registry: &dyn Registry,
    repo: &str,
    range: &VersionRange,
) -> Result<Version, RegistryError> {
    let versions = registry.list_versions(repo)?;
    let latest =
        select_latest(&versions, range).ok_or_else(|| RegistryError::NoMatchingVersion {
            repo: repo.to_string(),
            range: range.to_string(),
        })?;

    debug!("Latest version of {} in '{}' is {}", repo, range, latest);
    Ok(latest)
}

/// Fetch and open the archive of `repo@version`
///
/// The archive's own manifest must name exactly `repo@version`.
pub fn open_archive(
    registry: &dyn Registry,
    repo: &str,
    version: &Version,
) -> Result<Archive, RegistryError> {
    let path = registry.fetch_archive(repo, version)?;
    let archive = Archive::open(&path)?;

    let metadata = archive.metadata();
    if metadata.repo() != repo || metadata.version() != version {
        return Err(RegistryError::IdentityMismatch {
            path,
            expected: format!("{}@{}", repo, version),
            found: format!("{}@{}", metadata.repo(), metadata.version()),
        });
    }

    Ok(archive)
}
