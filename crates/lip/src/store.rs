//! Installed tooth records
//!
//! Every installed tooth has one manifest-shaped JSON file in the workspace
//! metadata directory, named after its escaped repo path. The presence of
//! that file is what makes a tooth installed.

use crate::manifest::{ManifestError, Metadata};
use crate::path::escape_file_name;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while reading or writing records
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access record: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse record {path}: {source}")]
    InvalidRecord {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Failed to serialize record: {0}")]
    SerializeError(#[from] ManifestError),

    /// File name does not belong to the tooth it describes
    #[error("Record {path} describes {repo}, which does not match its file name")]
    NameMismatch { path: PathBuf, repo: String },

    #[error("Tooth {0} is not installed")]
    NotInstalled(String),
}

/// Directory of installed records
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record file of `repo`
    pub fn record_path(&self, repo: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_file_name(repo)))
    }

    /// Every installed tooth, sorted by repo path
    pub fn list_installed(&self) -> Result<Vec<Metadata>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut installed = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let metadata = read_record(&path)?;
            if path != self.record_path(metadata.repo()) {
                return Err(StoreError::NameMismatch {
                    path,
                    repo: metadata.repo().to_string(),
                });
            }
            installed.push(metadata);
        }

        installed.sort_by(|a, b| a.repo().cmp(b.repo()));
        Ok(installed)
    }

    /// Record of `repo`, if installed
    pub fn get_installed(&self, repo: &str) -> Result<Option<Metadata>, StoreError> {
        let path = self.record_path(repo);
        if !path.is_file() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    pub fn is_installed(&self, repo: &str) -> bool {
        self.record_path(repo).is_file()
    }

    pub fn write_record(&self, metadata: &Metadata) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(metadata.repo());
        fs::write(&path, metadata.to_json()?)?;
        debug!("Wrote record {}", path.display());
        Ok(())
    }

    pub fn remove_record(&self, repo: &str) -> Result<(), StoreError> {
        let path = self.record_path(repo);
        if !path.is_file() {
            return Err(StoreError::NotInstalled(repo.to_string()));
        }
        fs::remove_file(&path)?;
        debug!("Removed record {}", path.display());
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<Metadata, StoreError> {
    Metadata::from_file(path).map_err(|source| StoreError::InvalidRecord {
        path: path.to_path_buf(),
        source,
    })
}
