//! Migration of format version 1 manifests
//!
//! Version 1 documents describe dependencies as nested arrays and carry
//! per-platform placements and commands inline. The migration filters those
//! by the target platform and produces a current-format document.

use super::{Commands, Files, Info, ManifestError, PlaceEntry, RawMetadata, Target, FORMAT_VERSION};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct V1Metadata {
    format_version: u64,
    tooth: String,
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, Vec<Vec<String>>>,
    #[serde(default)]
    information: V1Information,
    #[serde(default)]
    placement: Vec<V1Placement>,
    #[serde(default)]
    possession: Vec<String>,
    #[serde(default)]
    commands: Vec<V1Command>,
}

#[derive(Debug, Default, Deserialize)]
struct V1Information {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
}

#[derive(Debug, Deserialize)]
struct V1Placement {
    source: String,
    destination: String,
    #[serde(default, rename = "GOOS")]
    goos: String,
    #[serde(default, rename = "GOARCH")]
    goarch: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum V1CommandType {
    Install,
    Uninstall,
}

#[derive(Debug, Deserialize)]
struct V1Command {
    #[serde(rename = "type")]
    kind: V1CommandType,
    commands: Vec<String>,
    #[serde(rename = "GOOS")]
    goos: String,
    #[serde(default, rename = "GOARCH")]
    goarch: String,
}

fn applies(goos: &str, goarch: &str, target: &Target) -> bool {
    (goos.is_empty() || goos == target.goos) && (goarch.is_empty() || goarch == target.goarch)
}

/// Convert a format version 1 document into a current-format document
pub(crate) fn migrate_v1(document: Value, target: &Target) -> Result<Value, ManifestError> {
    let v1: V1Metadata = serde_json::from_value(document)
        .map_err(|e| ManifestError::Migration(e.to_string()))?;

    if v1.format_version != 1 {
        return Err(ManifestError::Migration(format!(
            "expected format version 1, found {}",
            v1.format_version
        )));
    }

    let mut dependencies = BTreeMap::new();
    for (repo, alternatives) in v1.dependencies {
        if alternatives.is_empty() {
            return Err(ManifestError::Migration(format!(
                "dependency '{}' has no version constraints",
                repo
            )));
        }
        let range = alternatives
            .iter()
            .map(|atoms| atoms.join(" "))
            .collect::<Vec<_>>()
            .join(" || ");
        dependencies.insert(repo, range);
    }

    let mut commands = Commands::default();
    for command in v1.commands {
        if !applies(&command.goos, &command.goarch, target) {
            continue;
        }
        match command.kind {
            V1CommandType::Install => commands.post_install.extend(command.commands),
            V1CommandType::Uninstall => commands.pre_uninstall.extend(command.commands),
        }
    }

    let place = v1
        .placement
        .into_iter()
        .filter(|placement| applies(&placement.goos, &placement.goarch, target))
        .map(|placement| PlaceEntry {
            src: placement.source,
            dest: placement
                .destination
                .strip_suffix('*')
                .map(str::to_string)
                .unwrap_or(placement.destination),
        })
        .collect();

    let migrated = RawMetadata {
        format_version: FORMAT_VERSION,
        tooth: v1.tooth,
        version: v1.version,
        info: Info {
            name: v1.information.name,
            description: v1.information.description,
            author: v1.information.author,
            tags: Vec::new(),
            source: String::new(),
        },
        commands,
        dependencies,
        prerequisites: BTreeMap::new(),
        files: Files {
            place,
            preserve: Vec::new(),
            remove: v1.possession,
        },
        platforms: Vec::new(),
    };

    serde_json::to_value(migrated).map_err(|e| ManifestError::Migration(e.to_string()))
}
