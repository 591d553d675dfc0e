//! Slash-separated paths and repository path validation
//!
//! `ToothPath` is the validated path type used for archive entries and
//! workspace destinations. Repository paths (`github.com/org/tooth`) are
//! kept as plain strings but checked with [`validate_repo_path`].

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Bytes kept as-is when a string is turned into a file name
const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors that can occur during path parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A segment contains forbidden characters or is reserved
    #[error("Invalid path segment '{segment}' in path '{path}': {reason}")]
    InvalidSegment {
        path: String,
        segment: String,
        reason: String,
    },

    /// Repository path does not follow the module path grammar
    #[error("Invalid repository path '{path}': {reason}")]
    InvalidRepoPath { path: String, reason: String },

    /// Operation needs at least one segment
    #[error("Cannot get directory of empty path")]
    EmptyPath,
}

/// Validated, slash-separated path
///
/// The first segment may be empty (absolute path) or a drive letter
/// such as `C:`. Every other segment is a portable file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToothPath {
    segments: Vec<String>,
}

impl ToothPath {
    /// The empty path
    pub fn empty() -> Self {
        ToothPath::default()
    }

    /// Parse and clean a path string. Backslashes are treated as separators.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let normalized = s.replace('\\', "/");
        let absolute = normalized.starts_with('/');

        let mut segments: Vec<String> = Vec::new();
        for part in normalized.split('/') {
            match part {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(last) if last != ".." => {
                        segments.pop();
                    }
                    None if absolute => {}
                    _ => segments.push(part.to_string()),
                },
                _ => segments.push(part.to_string()),
            }
        }

        if absolute {
            segments.insert(0, String::new());
        }

        for (i, segment) in segments.iter().enumerate() {
            if i == 0 && (segment.is_empty() || is_drive_letter(segment)) {
                continue;
            }
            check_file_segment(segment).map_err(|reason| PathError::InvalidSegment {
                path: s.to_string(),
                segment: segment.clone(),
                reason,
            })?;
        }

        Ok(ToothPath { segments })
    }

    /// Longest common leading sequence of segments
    pub fn longest_common<'a, I>(paths: I) -> ToothPath
    where
        I: IntoIterator<Item = &'a ToothPath>,
    {
        let mut iter = paths.into_iter();
        let Some(first) = iter.next() else {
            return ToothPath::empty();
        };

        let mut common = first.segments.len();
        for path in iter {
            common = first
                .segments
                .iter()
                .zip(&path.segments)
                .take(common)
                .take_while(|(a, b)| a == b)
                .count();
        }

        ToothPath {
            segments: first.segments[..common].to_vec(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Absolute paths start with `/` or a drive letter
    pub fn is_absolute(&self) -> bool {
        self.segments
            .first()
            .map(|s| s.is_empty() || is_drive_letter(s))
            .unwrap_or(false)
    }

    /// Last segment, or an empty string for the empty path
    pub fn base(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Parent path
    pub fn dir(&self) -> Result<ToothPath, PathError> {
        if self.segments.is_empty() {
            return Err(PathError::EmptyPath);
        }
        Ok(ToothPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn join(&self, other: &ToothPath) -> ToothPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        ToothPath { segments }
    }

    pub fn has_prefix(&self, prefix: &ToothPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn has_suffix(&self, suffix: &ToothPath) -> bool {
        self.segments.ends_with(&suffix.segments)
    }

    /// Strip `prefix` if present, otherwise return the path unchanged
    pub fn trim_prefix(&self, prefix: &ToothPath) -> ToothPath {
        if !self.has_prefix(prefix) {
            return self.clone();
        }
        ToothPath {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        }
    }

    /// Strip `suffix` if present, otherwise return the path unchanged
    pub fn trim_suffix(&self, suffix: &ToothPath) -> ToothPath {
        if !self.has_suffix(suffix) {
            return self.clone();
        }
        ToothPath {
            segments: self.segments[..self.segments.len() - suffix.segments.len()].to_vec(),
        }
    }

    /// True if `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &ToothPath) -> bool {
        other.has_prefix(self) && self.segments.len() < other.segments.len()
    }

    /// Native path representation
    pub fn to_path_buf(&self) -> PathBuf {
        let mut buf = PathBuf::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i == 0 && segment.is_empty() {
                buf.push("/");
            } else if i == 0 && is_drive_letter(segment) {
                buf.push(format!("{}\\", segment));
            } else {
                buf.push(segment);
            }
        }
        buf
    }
}

impl fmt::Display for ToothPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.len() == 1 && self.segments[0].is_empty() {
            return write!(f, "/");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

fn is_drive_letter(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

const WINDOWS_RESERVED: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn file_char_ok(c: char) -> bool {
    if c.is_ascii() {
        c.is_ascii_alphanumeric() || "!#$%&()+,-.=@[]^_{}~ ".contains(c)
    } else {
        c.is_alphabetic()
    }
}

fn check_reserved(segment: &str) -> Result<(), String> {
    let short = segment.split('.').next().unwrap_or(segment);
    if WINDOWS_RESERVED
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(short))
    {
        return Err(format!("'{}' is a reserved file name", short));
    }

    // 8.3 short names such as PROGRA~1
    if let Some(tilde) = short.rfind('~') {
        let suffix = &short[tilde + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return Err("short file name with a tilde suffix".to_string());
        }
    }

    Ok(())
}

fn check_file_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("empty segment".to_string());
    }
    if segment == "." || segment == ".." {
        return Err("relative segment".to_string());
    }
    if segment.ends_with('.') {
        return Err("trailing dot".to_string());
    }
    if let Some(c) = segment.chars().find(|c| !file_char_ok(*c)) {
        return Err(format!("invalid character {:?}", c));
    }
    check_reserved(segment)
}

/// Check a repository path such as `github.com/org/tooth`
///
/// Elements are ASCII letters, digits, `-`, `.`, `_` and `~`, with no leading
/// or trailing dots. The first element must be a lowercase host name that
/// contains a dot.
pub fn validate_repo_path(path: &str) -> Result<(), PathError> {
    let invalid = |reason: String| PathError::InvalidRepoPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("empty path".to_string()));
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(invalid("leading or trailing slash".to_string()));
    }

    for (i, element) in path.split('/').enumerate() {
        if element.is_empty() {
            return Err(invalid("double slash".to_string()));
        }
        if element.starts_with('.') || element.ends_with('.') {
            return Err(invalid(format!("element '{}' has a leading or trailing dot", element)));
        }
        if let Some(c) = element
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "-._~".contains(*c)))
        {
            return Err(invalid(format!("invalid character {:?}", c)));
        }
        check_reserved(element).map_err(invalid)?;

        if i == 0 {
            if !element.contains('.') {
                return Err(invalid("missing dot in first path element".to_string()));
            }
            if element.starts_with('-') {
                return Err(invalid("leading dash in first path element".to_string()));
            }
            if let Some(c) = element
                .chars()
                .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
            {
                return Err(invalid(format!("invalid character {:?} in host name", c)));
            }
        }
    }

    Ok(())
}

/// True if `path` is a valid repository path
pub fn is_repo_path(path: &str) -> bool {
    validate_repo_path(path).is_ok()
}

/// Encode an arbitrary string (repo path, URL) as a single file name
///
/// The encoding is reversible with [`unescape_file_name`].
pub fn escape_file_name(s: &str) -> String {
    utf8_percent_encode(s, FILE_NAME_SET).to_string()
}

/// Decode a file name produced by [`escape_file_name`]
pub fn unescape_file_name(name: &str) -> Option<String> {
    percent_decode_str(name)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
