//! Lip Package Manager Library
//!
//! This crate provides the core of the lip package manager, including:
//! - Semver version parsing and range matching
//! - Tooth manifest parsing, validation and format migration (tooth.json)
//! - Tooth archives and workspace-relative paths
//! - Specifier resolution against a Go module proxy registry
//! - Dependency resolution and install ordering
//! - Prerequisite checking
//! - Installation and uninstallation with lifecycle commands

pub mod archive;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod installer;
pub mod manifest;
pub mod path;
pub mod prerequisites;
pub mod registry;
pub mod resolver;
pub mod semver;
pub mod specifier;
pub mod store;

pub use archive::{Archive, ArchiveError};
pub use cache::{Cache, CacheEntry, CacheError};
pub use config::{Config, ConfigError, ConfigKey};
pub use context::{Context, Verbosity};
pub use installer::{install, reinstall, uninstall, InstallError};
pub use manifest::{ManifestError, Metadata, RawMetadata, Target};
pub use path::{PathError, ToothPath};
pub use prerequisites::find_missing_prerequisites;
pub use registry::{GoModuleProxy, Registry, RegistryError};
pub use resolver::{sort_by_dependency, DependencyResolver, ResolverError};
pub use semver::{SemverError, Version, VersionRange};
pub use specifier::{resolve_specifiers, Specifier, SpecifierError};
pub use store::{RecordStore, StoreError};
