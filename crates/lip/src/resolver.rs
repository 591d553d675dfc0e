//! Dependency resolution
//!
//! Computes the full set of archives to install from a set of root archives
//! and orders them so that dependencies come before their dependents.
//!
//! Resolution is first-fit: the first range seen for a repo fixes its
//! version, and later ranges can only accept or reject that choice.

use crate::archive::Archive;
use crate::manifest::Metadata;
use crate::registry::{self, Registry, RegistryError};
use crate::semver::Version;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during dependency resolution
#[derive(Debug, Error)]
pub enum ResolverError {
    /// A root disagrees with the version already fixed for its repo
    #[error("Trying to fix tooth {repo}@{requested}, but found {repo}@{fixed} fixed")]
    FixedVersionConflict {
        repo: String,
        requested: Version,
        fixed: Version,
    },

    /// A dependency range rejects the version already fixed for that repo
    #[error("{dependent} requires {repo} {range}, but {repo}@{fixed} is fixed")]
    UnsatisfiedDependency {
        dependent: String,
        repo: String,
        range: String,
        fixed: Version,
    },

    #[error("Failed to resolve dependency {repo} of {dependent}: {source}")]
    RegistryError {
        dependent: String,
        repo: String,
        #[source]
        source: RegistryError,
    },

    /// Circular dependency detected
    #[error("Tooth {0} has a circular dependency")]
    CircularDependency(String),
}

/// Dependency resolver
pub struct DependencyResolver<'r> {
    registry: &'r dyn Registry,

    /// Versions of installed teeth, fixed before any root is considered
    installed: HashMap<String, Version>,

    /// Replace installed versions with any root version
    force_reinstall: bool,

    /// Replace installed versions with newer root versions
    upgrade: bool,
}

impl<'r> DependencyResolver<'r> {
    /// Create a new resolver
    pub fn new(registry: &'r dyn Registry) -> Self {
        Self {
            registry,
            installed: HashMap::new(),
            force_reinstall: false,
            upgrade: false,
        }
    }

    /// Seed the fixed versions with installed teeth
    pub fn with_installed(mut self, installed: &[Metadata]) -> Self {
        self.installed = installed
            .iter()
            .map(|m| (m.repo().to_string(), m.version().clone()))
            .collect();
        self
    }

    pub fn with_force_reinstall(mut self, force_reinstall: bool) -> Self {
        self.force_reinstall = force_reinstall;
        self
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    /// Fix the versions of `roots` without fetching any dependency
    ///
    /// Returns the roots that survive the merge, one per repo.
    pub fn merge_roots(&self, roots: Vec<Archive>) -> Result<Vec<Archive>, ResolverError> {
        self.fix_roots(roots).map(|(_, roots)| roots)
    }

    /// Resolve all dependencies of `roots`
    ///
    /// Returns the roots followed by every newly fetched dependency, in
    /// breadth-first order. Dependencies already fixed (installed or among
    /// the roots) are checked but not fetched again.
    pub fn resolve(&self, roots: Vec<Archive>) -> Result<Vec<Archive>, ResolverError> {
        let (mut fixed, roots) = self.fix_roots(roots)?;
        let mut queue: VecDeque<Archive> = roots.into();
        let mut resolved = Vec::new();

        while let Some(archive) = queue.pop_front() {
            let dependent = format!("{}@{}", archive.metadata().repo(), archive.metadata().version());

            for (repo, range) in archive.metadata().dependencies() {
                if let Some(current) = fixed.get(repo) {
                    if !range.matches(current) {
                        return Err(ResolverError::UnsatisfiedDependency {
                            dependent,
                            repo: repo.clone(),
                            range: range.to_string(),
                            fixed: current.clone(),
                        });
                    }
                    continue;
                }

                let wrap = |source| ResolverError::RegistryError {
                    dependent: dependent.clone(),
                    repo: repo.clone(),
                    source,
                };
                let version =
                    registry::latest_version_in_range(self.registry, repo, range).map_err(wrap)?;
                let dependency = registry::open_archive(self.registry, repo, &version).map_err(wrap)?;

                debug!("Resolved {} {} to {} for {}", repo, range, version, dependent);
                fixed.insert(repo.clone(), version);
                queue.push_back(dependency);
            }

            resolved.push(archive);
        }

        Ok(resolved)
    }

    /// Apply the fixing rules to every root in order
    ///
    /// A root is fixed when its repo is not fixed yet, when reinstall is
    /// forced, or when upgrading to a greater version. An equal version is
    /// accepted as is and any other version is a conflict. Only roots whose
    /// version is the one finally fixed are kept.
    fn fix_roots(
        &self,
        roots: Vec<Archive>,
    ) -> Result<(HashMap<String, Version>, Vec<Archive>), ResolverError> {
        let mut fixed = self.installed.clone();

        for root in &roots {
            let repo = root.metadata().repo();
            let version = root.metadata().version();

            match fixed.get(repo) {
                None => {}
                Some(_) if self.force_reinstall => {}
                Some(current) if self.upgrade && version > current => {}
                Some(current) if current != version => {
                    return Err(ResolverError::FixedVersionConflict {
                        repo: repo.to_string(),
                        requested: version.clone(),
                        fixed: current.clone(),
                    });
                }
                Some(_) => continue,
            }
            fixed.insert(repo.to_string(), version.clone());
        }

        let mut seen = HashSet::new();
        let roots = roots
            .into_iter()
            .filter(|root| {
                let repo = root.metadata().repo();
                fixed.get(repo) == Some(root.metadata().version()) && seen.insert(repo.to_string())
            })
            .collect();

        Ok((fixed, roots))
    }
}

/// Order archives so that every dependency precedes its dependents
///
/// Only dependencies present in `archives` are considered.
pub fn sort_by_dependency(archives: Vec<Archive>) -> Result<Vec<Archive>, ResolverError> {
    let mut index = HashMap::new();
    for (i, archive) in archives.iter().enumerate() {
        index.entry(archive.metadata().repo().to_string()).or_insert(i);
    }

    let mut pre_visited = HashSet::new();
    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(archives.len());

    for i in 0..archives.len() {
        visit(i, &archives, &index, &mut pre_visited, &mut visited, &mut order)?;
    }

    let mut slots: Vec<Option<Archive>> = archives.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Depth-first visit with in-progress marking
fn visit(
    i: usize,
    archives: &[Archive],
    index: &HashMap<String, usize>,
    pre_visited: &mut HashSet<usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) -> Result<(), ResolverError> {
    if visited.contains(&i) {
        return Ok(());
    }
    if !pre_visited.insert(i) {
        return Err(ResolverError::CircularDependency(
            archives[i].metadata().repo().to_string(),
        ));
    }

    for repo in archives[i].metadata().dependencies().keys() {
        if let Some(&j) = index.get(repo) {
            visit(j, archives, index, pre_visited, visited, order)?;
        }
    }

    visited.insert(i);
    order.push(i);
    Ok(())
}
