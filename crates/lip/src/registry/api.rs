//! Go module proxy protocol
//!
//! URL layout and response formats of a `GOPROXY` server:
//! `<proxy>/<module>/@v/list` and `<proxy>/<module>/@v/<version>.zip`.

use crate::semver::Version;

/// Escape a module path the way the Go toolchain does
///
/// Upper-case letters become `!` followed by the lower-case letter so that
/// paths survive case-insensitive file systems.
pub fn escape_module_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// URL of the version list of a module
pub fn version_list_url(proxy: &str, repo: &str) -> String {
    format!(
        "{}/{}/@v/list",
        proxy.trim_end_matches('/'),
        escape_module_path(repo)
    )
}

/// URL of the zip file of a module version
///
/// Versions with major version 2 or above are served as `+incompatible`
/// because teeth do not carry a `/vN` module path suffix.
pub fn zip_url(proxy: &str, repo: &str, version: &Version) -> String {
    let file_name = if version.major() >= 2 {
        format!("v{}+incompatible.zip", version)
    } else {
        format!("v{}.zip", version)
    };

    format!(
        "{}/{}/@v/{}",
        proxy.trim_end_matches('/'),
        escape_module_path(repo),
        file_name
    )
}

/// Parse the body of an `@v/list` response
///
/// One version per line. Lines that are not tooth versions are skipped.
pub fn parse_version_list(body: &str) -> Vec<Version> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let line = line.strip_prefix('v').unwrap_or(line);
            let line = line.strip_suffix("+incompatible").unwrap_or(line);
            Version::parse(line).ok()
        })
        .collect()
}
