//! Tooth packing
//!
//! Zips a tooth's working directory into a `.tth` archive that can be
//! installed by path.

use crate::manifest::{ManifestError, Metadata, MANIFEST_FILE_NAME};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Archive extension produced by [`pack_tooth`]
pub const PACKED_EXTENSION: &str = "tth";

/// Directories never packed
const IGNORED_DIRS: [&str; 2] = [".git", ".lip"];

/// Errors that can occur while packing a tooth
#[derive(Debug, Error)]
pub enum PackError {
    #[error("Output path {0} must have the .tth extension")]
    InvalidOutput(PathBuf),

    #[error("Output path {0} already exists")]
    OutputExists(PathBuf),

    #[error("Failed to parse tooth.json: {0}")]
    ManifestError(#[from] ManifestError),

    #[error("Failed to write archive: {0}")]
    ZipError(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Pack every file under `dir` into the archive `output`
///
/// The manifest in `dir` must parse. Files keep their paths relative to
/// `dir`, so the manifest ends up at the archive root. Returns the packed
/// entry names in archive order.
pub fn pack_tooth(dir: &Path, output: &Path) -> Result<Vec<String>, PackError> {
    if output.extension().and_then(|e| e.to_str()) != Some(PACKED_EXTENSION) {
        return Err(PackError::InvalidOutput(output.to_path_buf()));
    }
    if output.exists() {
        return Err(PackError::OutputExists(output.to_path_buf()));
    }

    let metadata = Metadata::from_file(&dir.join(MANIFEST_FILE_NAME))?;

    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    info!(
        "Packing {}@{} into {}",
        metadata.repo(),
        metadata.version(),
        output.display()
    );

    let mut zip = ZipWriter::new(File::create(output)?);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut names = Vec::with_capacity(files.len());
    for (name, path) in files {
        write_entry(&mut zip, &name, &path, options)?;
        debug!("Packed {}", name);
        names.push(name);
    }
    zip.finish()?;

    Ok(names)
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    path: &Path,
    options: SimpleFileOptions,
) -> Result<(), PackError> {
    zip.start_file(name, options)?;
    let mut file = File::open(path)?;
    io::copy(&mut file, zip)?;
    Ok(())
}

/// Collect `(entry name, path)` for every regular file below `dir`
fn collect_files(base: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if IGNORED_DIRS.iter().any(|ignored| entry.file_name() == *ignored) {
                continue;
            }
            collect_files(base, &path, files)?;
        } else if file_type.is_file() {
            let name = path
                .strip_prefix(base)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init_manifest;

    #[test]
    fn test_rejects_wrong_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_manifest(temp_dir.path()).unwrap();

        let result = pack_tooth(temp_dir.path(), &temp_dir.path().join("tooth.zip"));
        assert!(matches!(result, Err(PackError::InvalidOutput(_))));
    }

    #[test]
    fn test_requires_valid_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE_NAME), "{}").unwrap();

        let output = temp_dir.path().join("tooth.tth");
        let result = pack_tooth(temp_dir.path(), &output);
        assert!(matches!(result, Err(PackError::ManifestError(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_existing_output_is_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_manifest(temp_dir.path()).unwrap();
        let output = temp_dir.path().join("tooth.tth");
        fs::write(&output, "previous").unwrap();

        let result = pack_tooth(temp_dir.path(), &output);
        assert!(matches!(result, Err(PackError::OutputExists(_))));
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
    }
}
