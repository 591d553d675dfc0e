//! Removing an installed tooth

use super::{parse_entry, run_commands, InstallError};
use crate::context::Context;
use crate::path::ToothPath;
use crate::store::RecordStore;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Uninstall one tooth from the workspace
///
/// Placed files not listed in `preserve` are deleted together with the
/// directories that become empty. Entries in `remove` are deleted even when
/// they are also preserved.
pub fn uninstall(ctx: &Context, repo: &str) -> Result<(), InstallError> {
    let store = RecordStore::new(ctx.metadata_dir());
    let metadata = store
        .get_installed(repo)?
        .ok_or_else(|| InstallError::NotInstalled(repo.to_string()))?;

    info!("Uninstalling {}@{}", metadata.repo(), metadata.version());

    run_commands(ctx, &metadata.commands().pre_uninstall)?;

    let workspace = ctx.workspace_dir();
    let preserved = metadata
        .files()
        .preserve
        .iter()
        .map(|entry| parse_entry(entry))
        .collect::<Result<HashSet<ToothPath>, _>>()?;

    for entry in &metadata.files().place {
        let dest = parse_entry(&entry.dest)?;
        if preserved.contains(&dest) {
            debug!("Preserving {}", dest);
            continue;
        }
        remove_path(&workspace.join(dest.to_path_buf()))?;
        prune_empty_parents(workspace, &dest);
    }

    for entry in &metadata.files().remove {
        let path = parse_entry(entry)?;
        remove_path(&workspace.join(path.to_path_buf()))?;
    }

    run_commands(ctx, &metadata.commands().post_uninstall)?;

    store.remove_record(repo)?;
    Ok(())
}

/// Delete a file or directory tree; a missing path is not an error
fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist, skipping", path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    debug!("Removed {}", path.display());
    Ok(())
}

/// Remove now-empty ancestors of `relative`, stopping below the workspace
fn prune_empty_parents(workspace: &Path, relative: &ToothPath) {
    let mut dir = match relative.dir() {
        Ok(dir) => dir,
        Err(_) => return,
    };

    while !dir.is_empty() {
        let absolute = workspace.join(dir.to_path_buf());
        let is_empty = match fs::read_dir(&absolute) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        };
        if !is_empty {
            break;
        }
        if let Err(e) = fs::remove_dir(&absolute) {
            debug!("Cannot remove {}: {}", absolute.display(), e);
            break;
        }
        dir = match dir.dir() {
            Ok(parent) => parent,
            Err(_) => break,
        };
    }
}
