//! Installing and uninstalling single teeth
//!
//! Each step is a hard failure point. A failure leaves the workspace as it
//! was at that step; nothing is rolled back.

mod shell;
mod uninstall;

pub use shell::run_commands;
pub use uninstall::uninstall;

use crate::archive::{Archive, ArchiveError};
use crate::context::Context;
use crate::path::{PathError, ToothPath};
use crate::store::{RecordStore, StoreError};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while installing or uninstalling a tooth
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Tooth {0} is already installed")]
    AlreadyInstalled(String),

    #[error("Tooth {0} is not installed")]
    NotInstalled(String),

    /// Placement target is already taken
    #[error("Destination {0} already exists")]
    DestinationExists(PathBuf),

    #[error("Invalid file entry '{entry}': {source}")]
    InvalidEntry {
        entry: String,
        #[source]
        source: PathError,
    },

    #[error("Failed to extract file: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Failed to update record: {0}")]
    StoreError(#[from] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to run command '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Lifecycle command exited unsuccessfully
    #[error("Command '{command}' failed with {status}")]
    CommandFailed { command: String, status: String },
}

pub(crate) fn parse_entry(entry: &str) -> Result<ToothPath, InstallError> {
    ToothPath::parse(entry).map_err(|source| InstallError::InvalidEntry {
        entry: entry.to_string(),
        source,
    })
}

/// Install one tooth into the workspace
///
/// Runs `pre_install`, places every file, runs `post_install` and finally
/// writes the installed record.
pub fn install(ctx: &Context, archive: &Archive) -> Result<(), InstallError> {
    install_keeping(ctx, archive, &HashSet::new())
}

/// Replace the installed version of a tooth with `archive`
///
/// Files preserved by the installed version survive its uninstall and are
/// kept as they are when the new version places a file at the same
/// destination.
pub fn reinstall(ctx: &Context, archive: &Archive) -> Result<(), InstallError> {
    let store = RecordStore::new(ctx.metadata_dir());
    let repo = archive.metadata().repo();
    let previous = store
        .get_installed(repo)?
        .ok_or_else(|| InstallError::NotInstalled(repo.to_string()))?;

    let kept = previous
        .files()
        .preserve
        .iter()
        .map(|entry| parse_entry(entry))
        .collect::<Result<HashSet<ToothPath>, _>>()?;

    uninstall(ctx, repo)?;
    install_keeping(ctx, archive, &kept)
}

fn install_keeping(
    ctx: &Context,
    archive: &Archive,
    kept: &HashSet<ToothPath>,
) -> Result<(), InstallError> {
    let store = RecordStore::new(ctx.metadata_dir());
    let metadata = archive.metadata();

    if store.is_installed(metadata.repo()) {
        return Err(InstallError::AlreadyInstalled(metadata.repo().to_string()));
    }

    info!("Installing {}@{}", metadata.repo(), metadata.version());

    run_commands(ctx, &metadata.commands().pre_install)?;

    for entry in &metadata.files().place {
        let src = parse_entry(&entry.src)?;
        let relative = parse_entry(&entry.dest)?;
        let dest = ctx.workspace_dir().join(relative.to_path_buf());

        if dest.exists() {
            if kept.contains(&relative) {
                debug!("Keeping preserved {}", relative);
                continue;
            }
            return Err(InstallError::DestinationExists(dest));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        archive.extract_file(&src, &dest)?;
        debug!("Placed {} at {}", src, dest.display());
    }

    run_commands(ctx, &metadata.commands().post_install)?;

    store.write_record(metadata)?;
    Ok(())
}
