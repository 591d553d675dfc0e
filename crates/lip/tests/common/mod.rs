//! Shared helpers for integration tests

#![allow(dead_code)]

use lip::registry::{Registry, RegistryError};
use lip::{Config, Context, Verbosity, Version};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Write a zip archive holding `files` under `root/`
pub fn write_archive(path: &Path, root: &str, files: &[(&str, &str)]) -> PathBuf {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (name, content) in files {
        let name = if root.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", root, name)
        };
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap();
    path.to_path_buf()
}

/// Write a tooth archive with the manifest and extra files
pub fn write_tooth(dir: &Path, manifest: &Value, files: &[(&str, &str)]) -> PathBuf {
    let repo = manifest["tooth"].as_str().unwrap();
    let version = manifest["version"].as_str().unwrap();
    let name = format!("{}-{}.zip", repo.replace('/', "_"), version);

    let manifest_text = serde_json::to_string_pretty(manifest).unwrap();
    let mut entries: Vec<(&str, &str)> = vec![("tooth.json", manifest_text.as_str())];
    entries.extend_from_slice(files);

    write_archive(&dir.join(name), "tooth-root", &entries)
}

/// Minimal manifest with the given dependencies
pub fn manifest(repo: &str, version: &str, dependencies: &[(&str, &str)]) -> Value {
    let dependencies: serde_json::Map<String, Value> = dependencies
        .iter()
        .map(|(repo, range)| (repo.to_string(), json!(range)))
        .collect();
    json!({
        "format_version": 2,
        "tooth": repo,
        "version": version,
        "info": { "name": repo, "description": "", "author": "", "tags": [] },
        "dependencies": dependencies,
    })
}

/// Context rooted in a scratch workspace
pub fn context(root: &Path) -> Context {
    let workspace = root.join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();
    Context::new(workspace, root.join("home"), Config::default(), Verbosity::Quiet)
}

/// In-memory registry backed by archives on disk
#[derive(Default)]
pub struct FakeRegistry {
    archives: HashMap<String, Vec<(Version, PathBuf)>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a tooth archive; its repo and version come from the manifest
    pub fn publish(&mut self, dir: &Path, manifest: Value, files: &[(&str, &str)]) {
        let path = write_tooth(dir, &manifest, files);
        let repo = manifest["tooth"].as_str().unwrap().to_string();
        let version = Version::parse(manifest["version"].as_str().unwrap()).unwrap();
        self.publish_file(&repo, version, path);
    }

    /// Publish an arbitrary file under `repo@version`
    pub fn publish_file(&mut self, repo: &str, version: Version, path: PathBuf) {
        self.archives
            .entry(repo.to_string())
            .or_default()
            .push((version, path));
    }
}

impl Registry for FakeRegistry {
    fn list_versions(&self, repo: &str) -> Result<Vec<Version>, RegistryError> {
        Ok(self
            .archives
            .get(repo)
            .map(|entries| entries.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    fn fetch_archive(&self, repo: &str, version: &Version) -> Result<PathBuf, RegistryError> {
        self.archives
            .get(repo)
            .and_then(|entries| entries.iter().find(|(v, _)| v == version))
            .map(|(_, path)| path.clone())
            .ok_or_else(|| RegistryError::VersionNotFound {
                repo: repo.to_string(),
                version: version.to_string(),
            })
    }
}
