//! Tooth manifest initialization

use crate::manifest::{Info, ManifestError, Metadata, RawMetadata, FORMAT_VERSION, MANIFEST_FILE_NAME};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during manifest initialization
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Manifest error
    #[error("Manifest error: {0}")]
    ManifestError(#[from] ManifestError),
}

/// Write a skeleton tooth.json into `dir`
///
/// Returns the path of the new manifest. An existing manifest is never
/// overwritten.
pub fn init_manifest(dir: &Path) -> Result<PathBuf, InitError> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    if manifest_path.exists() {
        return Err(InitError::AlreadyExists(manifest_path));
    }

    let raw = RawMetadata {
        format_version: FORMAT_VERSION,
        tooth: "example.com/org/tooth".to_string(),
        version: "0.0.0".to_string(),
        info: Info::default(),
        commands: Default::default(),
        dependencies: Default::default(),
        prerequisites: Default::default(),
        files: Default::default(),
        platforms: Vec::new(),
    };

    std::fs::create_dir_all(dir)?;
    Metadata::from_raw(raw)?.to_file(&manifest_path)?;

    Ok(manifest_path)
}
