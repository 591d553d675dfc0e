//! Tooth archives
//!
//! An archive is a zip file whose regular files share a common content root.
//! The manifest lives at `<content root>/tooth.json`; placement sources are
//! relative to the content root.

use crate::manifest::{ManifestError, Metadata, PlaceEntry, Target, MANIFEST_FILE_NAME};
use crate::path::{PathError, ToothPath};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while opening or reading an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to read archive: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not a readable zip container
    #[error("Failed to open zip archive {path}: {source}")]
    NotAZip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read zip entry: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Invalid entry name '{name}' in archive: {source}")]
    InvalidEntry {
        name: String,
        #[source]
        source: PathError,
    },

    #[error("Archive {0} does not contain tooth.json")]
    MissingManifest(PathBuf),

    #[error("Failed to parse tooth.json: {0}")]
    ManifestError(#[from] ManifestError),

    #[error("Archive does not contain file '{0}'")]
    MissingEntry(String),
}

/// An opened tooth archive
///
/// The metadata is already resolved for the target platform and its
/// wildcard placements are expanded.
#[derive(Debug, Clone)]
pub struct Archive {
    file_path: PathBuf,
    metadata: Metadata,
    content_root: ToothPath,
    /// Content-relative file path to zip entry index
    entries: BTreeMap<ToothPath, usize>,
}

impl Archive {
    /// Open an archive for the host platform
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        Self::open_for(path, &Target::host())
    }

    /// Open an archive, resolving platform overrides for `target`
    pub fn open_for(path: &Path, target: &Target) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|source| ArchiveError::NotAZip {
            path: path.to_path_buf(),
            source,
        })?;

        // Regular files only, in container order
        let mut files = Vec::new();
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            let name = entry.name();
            if name.ends_with('/') {
                continue;
            }
            let file_path = ToothPath::parse(name).map_err(|source| ArchiveError::InvalidEntry {
                name: name.to_string(),
                source,
            })?;
            files.push((file_path, i));
        }

        let content_root = content_root(files.iter().map(|(file_path, _)| file_path));

        let manifest_path = content_root.join(&ToothPath::parse(MANIFEST_FILE_NAME).map_err(
            |source| ArchiveError::InvalidEntry {
                name: MANIFEST_FILE_NAME.to_string(),
                source,
            },
        )?);
        let manifest_index = files
            .iter()
            .find(|(file_path, _)| *file_path == manifest_path)
            .map(|(_, index)| *index)
            .ok_or_else(|| ArchiveError::MissingManifest(path.to_path_buf()))?;

        let mut manifest_bytes = Vec::new();
        zip.by_index(manifest_index)?
            .read_to_end(&mut manifest_bytes)?;

        let metadata = Metadata::from_slice_for(&manifest_bytes, target)?.resolve_platform(target);

        let entries: BTreeMap<ToothPath, usize> = files
            .into_iter()
            .map(|(file_path, index)| (file_path.trim_prefix(&content_root), index))
            .collect();

        let content_files: Vec<ToothPath> = entries.keys().cloned().collect();
        let place = expand_wildcards(&metadata.files().place, &content_files);
        let metadata = metadata.with_place(place);

        debug!(
            "Opened archive {} ({}@{}, {} files, root '{}')",
            path.display(),
            metadata.repo(),
            metadata.version(),
            entries.len(),
            content_root
        );

        Ok(Archive {
            file_path: path.to_path_buf(),
            metadata,
            content_root,
            entries,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn content_root(&self) -> &ToothPath {
        &self.content_root
    }

    /// Content-relative paths of every regular file
    pub fn files(&self) -> impl Iterator<Item = &ToothPath> {
        self.entries.keys()
    }

    /// Copy the content-relative entry `src` to `dest` on disk
    pub fn extract_file(&self, src: &ToothPath, dest: &Path) -> Result<(), ArchiveError> {
        let index = *self
            .entries
            .get(src)
            .ok_or_else(|| ArchiveError::MissingEntry(src.to_string()))?;

        let file = File::open(&self.file_path)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|source| ArchiveError::NotAZip {
            path: self.file_path.clone(),
            source,
        })?;
        let mut entry = zip.by_index(index)?;
        let mut output = File::create(dest)?;
        std::io::copy(&mut entry, &mut output)?;
        Ok(())
    }
}

/// Longest common directory of a set of file paths
///
/// With a single file the common path is the file itself, so its parent
/// directory is used instead.
pub fn content_root<'a, I>(files: I) -> ToothPath
where
    I: IntoIterator<Item = &'a ToothPath>,
{
    let files: Vec<&ToothPath> = files.into_iter().collect();
    let root = ToothPath::longest_common(files.iter().copied());
    if files.len() == 1 {
        return root.dir().unwrap_or_default();
    }
    root
}

/// Expand wildcard placements against content-relative file paths
///
/// For `src` ending in `*`, every file whose path starts with the text before
/// the `*` yields one entry whose destination is the `dest` prefix followed
/// by the rest of the file path. Other entries are kept as they are.
pub fn expand_wildcards(place: &[PlaceEntry], files: &[ToothPath]) -> Vec<PlaceEntry> {
    let mut expanded = Vec::new();

    for entry in place {
        if !entry.is_wildcard() {
            expanded.push(entry.clone());
            continue;
        }

        let src_prefix = entry.src.trim_end_matches('*');
        let dest_prefix = entry.dest.trim_end_matches('*');

        for file in files {
            let file = file.to_string();
            if let Some(rest) = file.strip_prefix(src_prefix) {
                expanded.push(PlaceEntry {
                    src: file.clone(),
                    dest: format!("{}{}", dest_prefix, rest),
                });
            }
        }
    }

    expanded
}
