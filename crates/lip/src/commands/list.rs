//! Listing installed teeth

use crate::context::Context;
use crate::manifest::Metadata;
use crate::registry::{Registry, RegistryError};
use crate::semver::Version;
use crate::store::{RecordStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ListError {
    #[error("Failed to read installed records: {0}")]
    StoreError(#[from] StoreError),

    #[error("Failed to query {repo}: {source}")]
    RegistryError {
        repo: String,
        #[source]
        source: RegistryError,
    },
}

/// An installed tooth with a newer stable release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upgradable {
    pub repo: String,
    pub installed: Version,
    pub latest: Version,
}

/// Every installed record in the workspace, sorted by repo path
pub fn list_installed(ctx: &Context) -> Result<Vec<Metadata>, ListError> {
    Ok(RecordStore::new(ctx.metadata_dir()).list_installed()?)
}

/// Installed teeth whose latest stable version is newer than the installed one
///
/// Teeth without any stable release are skipped with a warning.
pub fn list_upgradable(ctx: &Context, registry: &dyn Registry) -> Result<Vec<Upgradable>, ListError> {
    let mut upgradable = Vec::new();

    for metadata in list_installed(ctx)? {
        let repo = metadata.repo().to_string();
        let versions = registry
            .list_versions(&repo)
            .map_err(|source| ListError::RegistryError {
                repo: repo.clone(),
                source,
            })?;
        let Some(latest) = versions.into_iter().filter(Version::is_stable).max() else {
            warn!("No stable release of {} found", repo);
            continue;
        };
        if &latest > metadata.version() {
            upgradable.push(Upgradable {
                repo,
                installed: metadata.version().clone(),
                latest,
            });
        }
    }

    Ok(upgradable)
}
