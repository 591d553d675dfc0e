//! Tooth manifest parsing (tooth.json)
//!
//! A manifest is checked against the document schema, migrated forward from
//! older format versions, deserialized into [`RawMetadata`] and finally
//! validated into a typed [`Metadata`].

mod migration;
mod schema;

use crate::path::{validate_repo_path, PathError, ToothPath};
use crate::semver::{SemverError, Version, VersionRange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// The manifest format version this crate reads and writes
pub const FORMAT_VERSION: u64 = 2;

/// File name of the manifest inside an archive's content root
pub const MANIFEST_FILE_NAME: &str = "tooth.json";

/// Errors that can occur during manifest parsing
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    /// Document is not valid JSON or does not deserialize
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Missing format_version")]
    MissingFormatVersion,

    #[error("format_version is not an integer")]
    InvalidFormatVersion,

    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u64),

    /// Document violates the schema
    #[error("Manifest does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Failed to migrate manifest: {0}")]
    Migration(String),

    #[error("Invalid tooth repo path: {0}")]
    InvalidRepoPath(#[source] PathError),

    #[error("Invalid version in manifest: {0}")]
    InvalidVersion(#[from] SemverError),

    /// A file entry is not a valid path
    #[error("Invalid file entry '{entry}': {reason}")]
    InvalidFileEntry { entry: String, reason: String },
}

/// GOOS/GOARCH pair that platform entries are matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub goos: String,
    pub goarch: String,
}

impl Target {
    pub fn new(goos: &str, goarch: &str) -> Self {
        Target {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
        }
    }

    /// The platform this binary runs on, spelled the Go way
    pub fn host() -> Self {
        let goos = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let goarch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "powerpc64" => "ppc64",
            "loongarch64" => "loong64",
            other => other,
        };
        Target::new(goos, goarch)
    }
}

/// Descriptive information about a tooth
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

/// Lifecycle commands, each run through the platform shell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commands {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_install: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_install: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_uninstall: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_uninstall: Vec<String>,
}

impl Commands {
    pub fn is_empty(&self) -> bool {
        self.pre_install.is_empty()
            && self.post_install.is_empty()
            && self.pre_uninstall.is_empty()
            && self.post_uninstall.is_empty()
    }
}

/// One file placement. A `src` ending in `*` is a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceEntry {
    pub src: String,
    pub dest: String,
}

impl PlaceEntry {
    pub fn is_wildcard(&self) -> bool {
        self.src.ends_with('*')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Files {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub place: Vec<PlaceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preserve: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl Files {
    pub fn is_empty(&self) -> bool {
        self.place.is_empty() && self.preserve.is_empty() && self.remove.is_empty()
    }
}

/// Platform-specific override as written in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPlatform {
    pub goos: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub goarch: String,
    #[serde(default, skip_serializing_if = "Commands::is_empty")]
    pub commands: Commands,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prerequisites: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Files::is_empty")]
    pub files: Files,
}

/// Manifest document shape (current format version)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMetadata {
    pub format_version: u64,
    pub tooth: String,
    pub version: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Commands::is_empty")]
    pub commands: Commands,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prerequisites: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Files::is_empty")]
    pub files: Files,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<RawPlatform>,
}

/// Validated platform override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformOverride {
    pub goos: String,
    pub goarch: String,
    pub commands: Commands,
    pub dependencies: BTreeMap<String, VersionRange>,
    pub prerequisites: BTreeMap<String, VersionRange>,
    pub files: Files,
}

impl PlatformOverride {
    fn applies_to(&self, target: &Target) -> bool {
        self.goos == target.goos && (self.goarch.is_empty() || self.goarch == target.goarch)
    }
}

/// Validated tooth manifest
///
/// Identity for resolution purposes is `(repo, version)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    repo: String,
    version: Version,
    info: Info,
    commands: Commands,
    dependencies: BTreeMap<String, VersionRange>,
    prerequisites: BTreeMap<String, VersionRange>,
    files: Files,
    platforms: Vec<PlatformOverride>,
}

impl Metadata {
    /// Load a manifest from a file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read(path)?;
        Self::from_slice(&content)
    }

    /// Parse a manifest, migrating legacy documents for the host platform
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        Self::from_slice_for(bytes, &Target::host())
    }

    /// Parse a manifest, migrating legacy documents for `target`
    pub fn from_slice_for(bytes: &[u8], target: &Target) -> Result<Self, ManifestError> {
        let mut document: Value = serde_json::from_slice(bytes)?;

        let format_version = document
            .get("format_version")
            .ok_or(ManifestError::MissingFormatVersion)?
            .as_u64()
            .ok_or(ManifestError::InvalidFormatVersion)?;

        let migrated = match format_version {
            1 => {
                schema::check_v1_document(&document).map_err(ManifestError::SchemaError)?;
                document = migration::migrate_v1(document, target)?;
                true
            }
            FORMAT_VERSION => false,
            other => return Err(ManifestError::UnsupportedFormatVersion(other)),
        };

        schema::check_document(&document).map_err(ManifestError::SchemaError)?;

        let raw: RawMetadata = serde_json::from_value(document)?;
        let metadata = Self::from_raw(raw)?;

        if migrated {
            warn!(
                "tooth.json format of {} is deprecated. This tooth might be obsolete.",
                metadata.repo
            );
        }

        Ok(metadata)
    }

    /// Validate a raw document
    pub fn from_raw(raw: RawMetadata) -> Result<Self, ManifestError> {
        if raw.format_version != FORMAT_VERSION {
            return Err(ManifestError::UnsupportedFormatVersion(raw.format_version));
        }

        validate_repo_path(&raw.tooth).map_err(ManifestError::InvalidRepoPath)?;
        let version = Version::parse(&raw.version)?;

        let dependencies = parse_ranges(&raw.dependencies)?;
        let prerequisites = parse_ranges(&raw.prerequisites)?;
        check_files(&raw.files)?;

        let platforms = raw
            .platforms
            .into_iter()
            .map(|platform| {
                check_files(&platform.files)?;
                Ok(PlatformOverride {
                    dependencies: parse_ranges(&platform.dependencies)?,
                    prerequisites: parse_ranges(&platform.prerequisites)?,
                    goos: platform.goos,
                    goarch: platform.goarch,
                    commands: platform.commands,
                    files: platform.files,
                })
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;

        Ok(Metadata {
            repo: raw.tooth,
            version,
            info: raw.info,
            commands: raw.commands,
            dependencies,
            prerequisites,
            files: raw.files,
            platforms,
        })
    }

    /// Document representation of this manifest
    pub fn to_raw(&self) -> RawMetadata {
        RawMetadata {
            format_version: FORMAT_VERSION,
            tooth: self.repo.clone(),
            version: self.version.to_string(),
            info: self.info.clone(),
            commands: self.commands.clone(),
            dependencies: range_strings(&self.dependencies),
            prerequisites: range_strings(&self.prerequisites),
            files: self.files.clone(),
            platforms: self
                .platforms
                .iter()
                .map(|platform| RawPlatform {
                    goos: platform.goos.clone(),
                    goarch: platform.goarch.clone(),
                    commands: platform.commands.clone(),
                    dependencies: range_strings(&platform.dependencies),
                    prerequisites: range_strings(&platform.prerequisites),
                    files: platform.files.clone(),
                })
                .collect(),
        }
    }

    /// Serialize as JSON with 4-space indentation
    pub fn to_json(&self) -> Result<Vec<u8>, ManifestError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.to_raw().serialize(&mut serializer)?;
        Ok(buffer)
    }

    /// Write the manifest to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Apply platform overrides matching `target`
    ///
    /// A matching entry replaces commands, dependencies, prerequisites and
    /// files wholesale. The last matching entry wins. The result carries no
    /// platform entries.
    pub fn resolve_platform(&self, target: &Target) -> Metadata {
        let mut resolved = Metadata {
            platforms: Vec::new(),
            ..self.clone()
        };

        if let Some(platform) = self.platforms.iter().rev().find(|p| p.applies_to(target)) {
            resolved.commands = platform.commands.clone();
            resolved.dependencies = platform.dependencies.clone();
            resolved.prerequisites = platform.prerequisites.clone();
            resolved.files = platform.files.clone();
        }

        resolved
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn dependencies(&self) -> &BTreeMap<String, VersionRange> {
        &self.dependencies
    }

    pub fn prerequisites(&self) -> &BTreeMap<String, VersionRange> {
        &self.prerequisites
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn platforms(&self) -> &[PlatformOverride] {
        &self.platforms
    }

    /// Replace placements, used once wildcards are expanded
    pub(crate) fn with_place(mut self, place: Vec<PlaceEntry>) -> Metadata {
        self.files.place = place;
        self
    }
}

fn parse_ranges(
    ranges: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, VersionRange>, ManifestError> {
    ranges
        .iter()
        .map(|(repo, range)| {
            validate_repo_path(repo).map_err(ManifestError::InvalidRepoPath)?;
            Ok((repo.clone(), VersionRange::parse(range)?))
        })
        .collect()
}

fn range_strings(ranges: &BTreeMap<String, VersionRange>) -> BTreeMap<String, String> {
    ranges
        .iter()
        .map(|(repo, range)| (repo.clone(), range.to_string()))
        .collect()
}

/// Check that `entry` is a relative path
fn check_relative(entry: &str, allow_empty: bool) -> Result<(), ManifestError> {
    let invalid = |reason: String| ManifestError::InvalidFileEntry {
        entry: entry.to_string(),
        reason,
    };

    let path = ToothPath::parse(entry).map_err(|e| invalid(e.to_string()))?;
    if path.is_absolute() {
        return Err(invalid("path must be relative".to_string()));
    }
    if path.is_empty() && !allow_empty {
        return Err(invalid("path is empty".to_string()));
    }
    Ok(())
}

fn check_files(files: &Files) -> Result<(), ManifestError> {
    for entry in &files.place {
        if entry.is_wildcard() {
            check_relative(entry.src.trim_end_matches('*'), true)?;
            check_relative(entry.dest.trim_end_matches('*'), true)?;
        } else {
            check_relative(&entry.src, false)?;
            check_relative(&entry.dest, false)?;
        }
    }
    for entry in files.preserve.iter().chain(&files.remove) {
        check_relative(entry, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "format_version": 2,
        "tooth": "example.com/org/tooth",
        "version": "1.2.0",
        "info": { "name": "Tooth", "description": "A tooth", "author": "org", "tags": ["tool"] },
        "commands": { "post_install": ["echo done"] },
        "dependencies": { "example.com/org/dep": ">=1.0.0 <2.0.0" },
        "files": { "place": [{ "src": "bin/*", "dest": "bin/" }] },
        "platforms": [
            { "goos": "windows", "files": { "place": [{ "src": "win/*", "dest": "bin/" }] } },
            { "goos": "linux", "goarch": "arm64", "dependencies": { "example.com/org/arm": "1.0.x" } }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let metadata = Metadata::from_slice(MANIFEST.as_bytes()).unwrap();
        assert_eq!(metadata.repo(), "example.com/org/tooth");
        assert_eq!(metadata.version(), &Version::new(1, 2, 0));
        assert_eq!(metadata.info().tags, vec!["tool"]);
        assert_eq!(metadata.commands().post_install, vec!["echo done"]);
        assert_eq!(metadata.dependencies().len(), 1);
        assert_eq!(metadata.platforms().len(), 2);
    }

    #[test]
    fn test_missing_and_unsupported_format_version() {
        let missing = r#"{"tooth": "example.com/a/b", "version": "1.0.0", "info": {}}"#;
        assert!(matches!(
            Metadata::from_slice(missing.as_bytes()),
            Err(ManifestError::MissingFormatVersion)
        ));

        let future = r#"{"format_version": 3, "tooth": "example.com/a/b", "version": "1.0.0", "info": {}}"#;
        assert!(matches!(
            Metadata::from_slice(future.as_bytes()),
            Err(ManifestError::UnsupportedFormatVersion(3))
        ));
    }

    #[test]
    fn test_semantic_errors() {
        let bad_repo = r#"{"format_version": 2, "tooth": "not a repo", "version": "1.0.0", "info": {}}"#;
        assert!(matches!(
            Metadata::from_slice(bad_repo.as_bytes()),
            Err(ManifestError::InvalidRepoPath(_))
        ));

        let bad_range = r#"{"format_version": 2, "tooth": "example.com/a/b", "version": "1.0.0", "info": {},
            "dependencies": {"example.com/a/c": "^1.0.0"}}"#;
        assert!(matches!(
            Metadata::from_slice(bad_range.as_bytes()),
            Err(ManifestError::InvalidVersion(_))
        ));

        let absolute_dest = r#"{"format_version": 2, "tooth": "example.com/a/b", "version": "1.0.0", "info": {},
            "files": {"place": [{"src": "a.txt", "dest": "/etc/a.txt"}]}}"#;
        assert!(matches!(
            Metadata::from_slice(absolute_dest.as_bytes()),
            Err(ManifestError::InvalidFileEntry { .. })
        ));
    }

    #[test]
    fn test_platform_overlay_replaces_sections() {
        let metadata = Metadata::from_slice(MANIFEST.as_bytes()).unwrap();

        let windows = metadata.resolve_platform(&Target::new("windows", "amd64"));
        assert!(windows.platforms().is_empty());
        assert_eq!(windows.files().place[0].src, "win/*");
        assert!(windows.dependencies().is_empty());
        assert!(windows.commands().is_empty());

        let arm = metadata.resolve_platform(&Target::new("linux", "arm64"));
        assert!(arm.dependencies().contains_key("example.com/org/arm"));
        assert!(arm.files().is_empty());

        let other = metadata.resolve_platform(&Target::new("linux", "amd64"));
        assert_eq!(other.files(), metadata.files());
        assert_eq!(other.dependencies(), metadata.dependencies());
    }

    #[test]
    fn test_last_matching_platform_wins() {
        let manifest = r#"{"format_version": 2, "tooth": "example.com/a/b", "version": "1.0.0", "info": {},
            "platforms": [
                {"goos": "linux", "commands": {"pre_install": ["first"]}},
                {"goos": "linux", "goarch": "amd64", "commands": {"pre_install": ["second"]}}
            ]}"#;
        let metadata = Metadata::from_slice(manifest.as_bytes()).unwrap();
        let resolved = metadata.resolve_platform(&Target::new("linux", "amd64"));
        assert_eq!(resolved.commands().pre_install, vec!["second"]);
    }

    #[test]
    fn test_json_round_trip() {
        let metadata = Metadata::from_slice(MANIFEST.as_bytes()).unwrap();
        let json = metadata.to_json().unwrap();
        assert!(String::from_utf8_lossy(&json).contains("\n    \"format_version\": 2"));
        assert_eq!(Metadata::from_slice(&json).unwrap(), metadata);
    }
}
