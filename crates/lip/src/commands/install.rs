//! Install command
//!
//! Resolves specifiers and their dependencies, checks prerequisites, then
//! installs each tooth in dependency order.

use crate::archive::Archive;
use crate::context::Context;
use crate::installer::{self, InstallError};
use crate::prerequisites::find_missing_prerequisites;
use crate::registry::Registry;
use crate::resolver::{sort_by_dependency, DependencyResolver, ResolverError};
use crate::semver::Version;
use crate::specifier::{resolve_specifiers, Specifier, SpecifierError};
use crate::store::{RecordStore, StoreError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while planning or running an install
#[derive(Debug, Error)]
pub enum PlanError {
    /// Specifier parsing or resolution error
    #[error("Failed to resolve specifiers: {0}")]
    SpecifierError(#[from] SpecifierError),

    /// Dependency resolution error
    #[error("Failed to resolve dependencies: {0}")]
    ResolverError(#[from] ResolverError),

    /// Every prerequisite that is neither installed nor being installed
    #[error("Missing prerequisites: {}", format_missing(.0))]
    MissingPrerequisites(BTreeMap<String, String>),

    /// Record store error
    #[error("Failed to read installed records: {0}")]
    StoreError(#[from] StoreError),

    #[error("Failed to install {repo}: {source}")]
    Install {
        repo: String,
        #[source]
        source: InstallError,
    },
}

fn format_missing(missing: &BTreeMap<String, String>) -> String {
    missing
        .iter()
        .map(|(repo, range)| format!("{} ({})", repo, range))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Install options
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Replace installed teeth when a newer version is resolved
    pub upgrade: bool,

    /// Reinstall teeth even when already installed
    pub force_reinstall: bool,

    /// Install only the named teeth, skipping dependency resolution
    pub no_dependencies: bool,
}

/// What to do with one resolved tooth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    Install,
    Reinstall,
    Skip,
}

/// Install result
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Newly installed teeth, as `repo@version`
    pub installed: Vec<String>,

    /// Teeth uninstalled and installed again
    pub reinstalled: Vec<String>,

    /// Teeth left untouched
    pub skipped: Vec<String>,
}

/// Decide the action for a tooth given the installed version, if any
pub fn decide_action(
    installed: Option<&Version>,
    candidate: &Version,
    options: &InstallOptions,
) -> InstallAction {
    match installed {
        None => InstallAction::Install,
        Some(_) if options.force_reinstall => InstallAction::Reinstall,
        Some(current) if options.upgrade && candidate > current => InstallAction::Reinstall,
        Some(_) => InstallAction::Skip,
    }
}

/// Install teeth named by specifier strings
///
/// Nothing is installed until every specifier, dependency and prerequisite
/// has been resolved. Installation itself is not transactional: a failing
/// tooth leaves the teeth before it installed.
pub fn install_specifiers(
    ctx: &Context,
    registry: &dyn Registry,
    specifiers: &[String],
    options: InstallOptions,
) -> Result<InstallReport, PlanError> {
    let specifiers = specifiers
        .iter()
        .map(|s| Specifier::parse(s))
        .collect::<Result<Vec<_>, _>>()?;

    let roots = resolve_specifiers(registry, &specifiers)?;

    let store = RecordStore::new(ctx.metadata_dir());
    let installed = store.list_installed()?;

    let resolver = DependencyResolver::new(registry)
        .with_installed(&installed)
        .with_upgrade(options.upgrade)
        .with_force_reinstall(options.force_reinstall);

    let archives = if options.no_dependencies {
        resolver.merge_roots(roots)?
    } else {
        let archives = resolver.resolve(roots)?;

        let missing = find_missing_prerequisites(&archives, &installed);
        if !missing.is_empty() {
            return Err(PlanError::MissingPrerequisites(missing));
        }
        archives
    };

    let sorted = sort_by_dependency(archives)?;
    debug!("Install order: {}", describe(&sorted));

    let mut report = InstallReport::default();
    for archive in &sorted {
        let metadata = archive.metadata();
        let repo = metadata.repo();
        let label = format!("{}@{}", repo, metadata.version());

        let current = store.get_installed(repo)?.map(|m| m.version().clone());
        match decide_action(current.as_ref(), metadata.version(), &options) {
            InstallAction::Install => {
                install_one(ctx, archive)?;
                report.installed.push(label);
            }
            InstallAction::Reinstall => {
                info!(
                    "Replacing {}@{} with {}",
                    repo,
                    current.map(|v| v.to_string()).unwrap_or_default(),
                    metadata.version()
                );
                installer::reinstall(ctx, archive).map_err(|source| PlanError::Install {
                    repo: repo.to_string(),
                    source,
                })?;
                report.reinstalled.push(label);
            }
            InstallAction::Skip => {
                info!("{} is already installed", label);
                report.skipped.push(label);
            }
        }
    }

    Ok(report)
}

fn install_one(ctx: &Context, archive: &Archive) -> Result<(), PlanError> {
    installer::install(ctx, archive).map_err(|source| PlanError::Install {
        repo: archive.metadata().repo().to_string(),
        source,
    })
}

fn describe(archives: &[Archive]) -> String {
    archives
        .iter()
        .map(|a| format!("{}@{}", a.metadata().repo(), a.metadata().version()))
        .collect::<Vec<_>>()
        .join(", ")
}
