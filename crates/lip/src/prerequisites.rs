//! Prerequisite checks
//!
//! Prerequisites are never installed automatically. Each one must be met by
//! an installed tooth or by an archive about to be installed.

use crate::archive::Archive;
use crate::manifest::Metadata;
use std::collections::BTreeMap;
use tracing::debug;

/// Collect every unmet prerequisite of `archives`
///
/// Returns a map from repo path to the required range. An empty map means
/// everything is satisfied.
pub fn find_missing_prerequisites(
    archives: &[Archive],
    installed: &[Metadata],
) -> BTreeMap<String, String> {
    let mut missing = BTreeMap::new();

    for archive in archives {
        for (repo, range) in archive.metadata().prerequisites() {
            let installed_match = installed
                .iter()
                .any(|m| m.repo() == repo && range.matches(m.version()));
            let pending_match = archives.iter().any(|other| {
                other.metadata().repo() == repo && range.matches(other.metadata().version())
            });

            if installed_match || pending_match {
                continue;
            }

            debug!(
                "{} requires {} {}, which is not available",
                archive.metadata().repo(),
                repo,
                range
            );
            missing.insert(repo.clone(), range.to_string());
        }
    }

    missing
}
