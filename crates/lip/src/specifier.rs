//! Install specifiers
//!
//! A specifier names either a local archive file or a registry repo with an
//! optional version: `./tooth.zip`, `github.com/org/tooth`,
//! `github.com/org/tooth@1.2.0`.

use crate::archive::{Archive, ArchiveError};
use crate::path::{is_repo_path, PathError, ToothPath};
use crate::registry::{self, Registry, RegistryError};
use crate::semver::{SemverError, Version};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while parsing or resolving a specifier
#[derive(Debug, Error)]
pub enum SpecifierError {
    #[error("Invalid requirement specifier {specifier}: {source}")]
    InvalidArchivePath {
        specifier: String,
        #[source]
        source: PathError,
    },

    #[error("Invalid requirement specifier {specifier}: {source}")]
    InvalidVersion {
        specifier: String,
        #[source]
        source: SemverError,
    },

    #[error("Failed to open archive {path}: {source}")]
    ArchiveError {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Failed to resolve {specifier}: {source}")]
    RegistryError {
        specifier: String,
        #[source]
        source: RegistryError,
    },
}

/// What the user asked to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// Local archive file
    Archive(ToothPath),

    /// Registry repo, latest version when `version` is `None`
    Repo {
        repo: String,
        version: Option<Version>,
    },
}

impl Specifier {
    /// Parse a specifier string
    ///
    /// Repo syntax wins whenever the text before the only `@` (or the whole
    /// string) is a valid repo path. Everything else is an archive path.
    pub fn parse(s: &str) -> Result<Self, SpecifierError> {
        let parts: Vec<&str> = s.split('@').collect();

        match parts.as_slice() {
            [repo] if is_repo_path(repo) => Ok(Specifier::Repo {
                repo: repo.to_string(),
                version: None,
            }),
            [repo, version] if is_repo_path(repo) => {
                let version =
                    Version::parse(version).map_err(|source| SpecifierError::InvalidVersion {
                        specifier: s.to_string(),
                        source,
                    })?;
                Ok(Specifier::Repo {
                    repo: repo.to_string(),
                    version: Some(version),
                })
            }
            _ => {
                let path =
                    ToothPath::parse(s).map_err(|source| SpecifierError::InvalidArchivePath {
                        specifier: s.to_string(),
                        source,
                    })?;
                Ok(Specifier::Archive(path))
            }
        }
    }

    /// Open the archive this specifier refers to
    ///
    /// Repo specifiers without a version resolve to the latest version. The
    /// downloaded archive must identify itself as the requested tooth.
    pub fn resolve(&self, registry: &dyn Registry) -> Result<Archive, SpecifierError> {
        match self {
            Specifier::Archive(path) => {
                let path = path.to_path_buf();
                Archive::open(&path).map_err(|source| SpecifierError::ArchiveError { path, source })
            }
            Specifier::Repo { repo, version } => {
                let wrap = |source| SpecifierError::RegistryError {
                    specifier: self.to_string(),
                    source,
                };

                let version = match version {
                    Some(version) => version.clone(),
                    None => registry::latest_version(registry, repo).map_err(wrap)?,
                };
                debug!("Resolving {} to {}@{}", self, repo, version);

                registry::open_archive(registry, repo, &version).map_err(wrap)
            }
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specifier::Archive(path) => write!(f, "{}", path),
            Specifier::Repo {
                repo,
                version: Some(version),
            } => write!(f, "{}@{}", repo, version),
            Specifier::Repo { repo, version: None } => write!(f, "{}", repo),
        }
    }
}

/// Resolve every specifier to an opened archive, in order
pub fn resolve_specifiers(
    registry: &dyn Registry,
    specifiers: &[Specifier],
) -> Result<Vec<Archive>, SpecifierError> {
    specifiers.iter().map(|s| s.resolve(registry)).collect()
}
