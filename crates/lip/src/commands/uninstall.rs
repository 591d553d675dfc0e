//! Uninstall command

use crate::context::Context;
use crate::installer::{self, InstallError};
use crate::store::{RecordStore, StoreError};
use thiserror::Error;

/// Errors that can occur during uninstallation
#[derive(Debug, Error)]
pub enum UninstallError {
    /// None of these teeth is installed; nothing was removed
    #[error("Teeth not installed: {}", .0.join(", "))]
    NotInstalled(Vec<String>),

    #[error("Failed to read installed records: {0}")]
    StoreError(#[from] StoreError),

    #[error("Failed to uninstall {repo}: {source}")]
    Uninstall {
        repo: String,
        #[source]
        source: InstallError,
    },
}

/// Uninstall installed teeth by repo path
///
/// Every repo must be installed; otherwise nothing is touched.
pub fn uninstall_teeth(ctx: &Context, repos: &[String]) -> Result<Vec<String>, UninstallError> {
    let store = RecordStore::new(ctx.metadata_dir());

    let unknown: Vec<String> = repos
        .iter()
        .filter(|repo| !store.is_installed(repo))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(UninstallError::NotInstalled(unknown));
    }

    let mut removed = Vec::new();
    for repo in repos {
        // Listed twice on the command line
        if removed.contains(repo) {
            continue;
        }
        installer::uninstall(ctx, repo).map_err(|source| UninstallError::Uninstall {
            repo: repo.clone(),
            source,
        })?;
        removed.push(repo.clone());
    }

    Ok(removed)
}
