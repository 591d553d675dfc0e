//! Freezing installed teeth into a specifier list

use crate::context::Context;
use crate::store::{RecordStore, StoreError};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while freezing
#[derive(Debug, Error)]
pub enum FreezeError {
    #[error("Failed to read installed records: {0}")]
    StoreError(#[from] StoreError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// `repo@version` for every installed tooth, ordered by repo
pub fn freeze(ctx: &Context) -> Result<Vec<String>, FreezeError> {
    let store = RecordStore::new(ctx.metadata_dir());
    Ok(store
        .list_installed()?
        .iter()
        .map(|m| format!("{}@{}", m.repo(), m.version()))
        .collect())
}

/// Write the frozen specifiers to `output`, one per line
///
/// The file can be passed back to `install` line by line to reproduce the
/// workspace.
pub fn freeze_to_file(ctx: &Context, output: &Path) -> Result<Vec<String>, FreezeError> {
    let specifiers = freeze(ctx)?;

    let mut content = specifiers.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    std::fs::write(output, content).map_err(|source| FreezeError::Write {
        path: output.display().to_string(),
        source,
    })?;

    info!("Wrote {} specifiers to {}", specifiers.len(), output.display());
    Ok(specifiers)
}
