//! Download cache
//!
//! Stores downloaded artifacts under `<lip home>/cache/`, one file per source
//! URL. The file name is the escaped URL, so the cache can be listed without
//! any side index.

use crate::path::{escape_file_name, unescape_file_name};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A file in the cache directory is not a cache entry
    #[error("Invalid cache entry name: {0}")]
    InvalidEntry(String),
}

/// One cached artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Source URL
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
    /// Hex-encoded SHA-256 of the content
    pub sha256: String,
}

/// URL-keyed artifact cache
///
/// Directory structure:
/// ```text
/// ~/.lip/cache/
/// ├── https%3A%2F%2Fgoproxy.io%2F...%2Fv1.0.0.zip
/// └── .tmp/
/// ```
#[derive(Debug, Clone)]
pub struct Cache {
    /// Root cache directory
    root: PathBuf,
}

impl Cache {
    /// Open a cache rooted at `root`, creating the directory if needed
    pub fn init(root: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path where the artifact for `url` is (or would be) stored
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.root.join(escape_file_name(url))
    }

    /// Check if an artifact for `url` is cached
    pub fn contains(&self, url: &str) -> bool {
        self.entry_path(url).is_file()
    }

    /// Cached artifact for `url`, if any
    pub fn get(&self, url: &str) -> Option<PathBuf> {
        let path = self.entry_path(url);
        path.is_file().then_some(path)
    }

    /// Store an artifact
    ///
    /// # Arguments
    /// * `url` - Source URL, used as the key
    /// * `bytes` - Artifact content
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the cached file
    /// * `Err(CacheError)` - Storage failed
    pub fn store(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let final_path = self.entry_path(url);

        // Write to temporary file first (atomic write)
        let tmp_dir = self.root.join(".tmp");
        fs::create_dir_all(&tmp_dir)?;
        let tmp_path = tmp_dir.join(format!("{}.{}", escape_file_name(url), std::process::id()));
        let mut tmp_file = fs::File::create(&tmp_path)?;
        tmp_file.write_all(bytes)?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, &final_path)?;

        debug!(
            "Cached {} ({} bytes, sha256 {})",
            url,
            bytes.len(),
            hex::encode(Sha256::digest(bytes))
        );

        Ok(final_path)
    }

    /// List cached artifacts, sorted by URL
    pub fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();

        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let url =
                unescape_file_name(&name).ok_or_else(|| CacheError::InvalidEntry(name.clone()))?;
            let path = dir_entry.path();
            let content = fs::read(&path)?;

            entries.push(CacheEntry {
                url,
                size: content.len() as u64,
                sha256: hex::encode(Sha256::digest(&content)),
                path,
            });
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }

    /// Remove every cached artifact
    ///
    /// Returns the number of removed entries.
    pub fn purge(&self) -> Result<usize, CacheError> {
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_type()?.is_dir() {
                fs::remove_dir_all(dir_entry.path())?;
            } else {
                fs::remove_file(dir_entry.path())?;
                removed += 1;
            }
        }

        debug!("Purged {} cache entries from {}", removed, self.root.display());
        Ok(removed)
    }
}
