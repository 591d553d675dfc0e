//! Semantic versioning parser and range matching
//!
//! Versions follow `MAJOR.MINOR.PATCH[-name[.N]]`. Ranges are disjunctions
//! (`||`) of whitespace-separated conjunctions of comparators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during version or range parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemverError {
    /// Invalid version format
    #[error("Invalid version string '{0}'")]
    InvalidVersion(String),

    /// Invalid range format
    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-([a-z]+)(?:\.(0|[1-9]\d*))?)?$")
        .expect("version pattern is valid")
});

static COMPATIBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.x$").expect("compatible pattern is valid")
});

/// Semantic version (MAJOR.MINOR.PATCH with an optional named pre-release)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release_name: Option<String>,
    pre_release_number: Option<u64>,
}

impl Version {
    /// Create a stable version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre_release_name: None,
            pre_release_number: None,
        }
    }

    /// Create a pre-release version such as `1.0.0-beta.2`
    pub fn pre_release(
        major: u64,
        minor: u64,
        patch: u64,
        name: &str,
        number: Option<u64>,
    ) -> Result<Self, SemverError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(SemverError::InvalidVersion(format!(
                "{}.{}.{}-{}",
                major, minor, patch, name
            )));
        }

        Ok(Version {
            major,
            minor,
            patch,
            pre_release_name: Some(name.to_string()),
            pre_release_number: number,
        })
    }

    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| SemverError::InvalidVersion(s.to_string()))?;

        let number = |idx: usize| -> Result<u64, SemverError> {
            caps[idx]
                .parse()
                .map_err(|_| SemverError::InvalidVersion(s.to_string()))
        };

        let pre_release_number = match caps.get(5) {
            Some(m) => Some(
                m.as_str()
                    .parse()
                    .map_err(|_| SemverError::InvalidVersion(s.to_string()))?,
            ),
            None => None,
        };

        Ok(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre_release_name: caps.get(4).map(|m| m.as_str().to_string()),
            pre_release_number,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release_name(&self) -> Option<&str> {
        self.pre_release_name.as_deref()
    }

    pub fn pre_release_number(&self) -> Option<u64> {
        self.pre_release_number
    }

    /// A version without a pre-release tag
    pub fn is_stable(&self) -> bool {
        self.pre_release_name.is_none()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref name) = self.pre_release_name {
            write!(f, "-{}", name)?;
            if let Some(number) = self.pre_release_number {
                write!(f, ".{}", number)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = SemverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.pre_release_name, &other.pre_release_name) {
                // A release sorts after any of its pre-releases
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
            .then(self.pre_release_number.cmp(&other.pre_release_number))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Comparison operator of a single range atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// `M.m.x`: same major and minor, any patch or pre-release
    Compatible,
}

/// A single atom of a version range, e.g. `>=1.2.0` or `2.3.x`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    /// Parse one atom. Operators: `>`, `>=`, `<`, `<=`, `!`/`!=`, `=`/`==`
    /// or none (exact). A trailing `.x` without an operator means compatible.
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let invalid = |reason: &str| SemverError::InvalidRange {
            range: s.to_string(),
            reason: reason.to_string(),
        };

        const PREFIXES: [(&str, Op); 8] = [
            (">=", Op::GreaterOrEqual),
            ("<=", Op::LessOrEqual),
            ("!=", Op::NotEqual),
            ("==", Op::Equal),
            (">", Op::Greater),
            ("<", Op::Less),
            ("!", Op::NotEqual),
            ("=", Op::Equal),
        ];

        let (op, rest) = PREFIXES
            .iter()
            .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (Some(*op), rest)))
            .unwrap_or((None, s));

        if let Some(caps) = COMPATIBLE_RE.captures(rest) {
            if op.is_some() {
                return Err(invalid("a wildcard atom cannot carry an operator"));
            }
            let major = caps[1].parse().map_err(|_| invalid("major out of range"))?;
            let minor = caps[2].parse().map_err(|_| invalid("minor out of range"))?;
            return Ok(Comparator {
                op: Op::Compatible,
                version: Version::new(major, minor, 0),
            });
        }

        let version = Version::parse(rest).map_err(|e| invalid(&e.to_string()))?;
        Ok(Comparator {
            op: op.unwrap_or(Op::Equal),
            version,
        })
    }

    /// Check if a version satisfies this atom
    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Equal => version == &self.version,
            Op::NotEqual => version != &self.version,
            Op::Greater => version > &self.version,
            Op::GreaterOrEqual => version >= &self.version,
            Op::Less => version < &self.version,
            Op::LessOrEqual => version <= &self.version,
            Op::Compatible => {
                version.major == self.version.major && version.minor == self.version.minor
            }
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::Equal => write!(f, "{}", self.version),
            Op::NotEqual => write!(f, "!{}", self.version),
            Op::Greater => write!(f, ">{}", self.version),
            Op::GreaterOrEqual => write!(f, ">={}", self.version),
            Op::Less => write!(f, "<{}", self.version),
            Op::LessOrEqual => write!(f, "<={}", self.version),
            Op::Compatible => write!(f, "{}.{}.x", self.version.major, self.version.minor),
        }
    }
}

/// Version range ("match group"): any conjunction matching means a match
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    alternatives: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// A range accepting every version
    pub fn any() -> Self {
        VersionRange {
            alternatives: vec![Vec::new()],
        }
    }

    /// A range accepting exactly one version
    pub fn exact(version: Version) -> Self {
        VersionRange {
            alternatives: vec![vec![Comparator {
                op: Op::Equal,
                version,
            }]],
        }
    }

    /// Parse a range string like `>=1.0.0 <2.0.0 || 3.1.x`
    pub fn parse(s: &str) -> Result<Self, SemverError> {
        let mut alternatives = Vec::new();

        for group in s.split("||") {
            let mut atoms = Vec::new();
            let mut pending_op: Option<&str> = None;

            for token in group.split_whitespace() {
                // Allow `>= 1.0.0` by gluing a bare operator onto the next token
                if is_bare_operator(token) {
                    if pending_op.is_some() {
                        return Err(SemverError::InvalidRange {
                            range: s.to_string(),
                            reason: format!("dangling operator '{}'", token),
                        });
                    }
                    pending_op = Some(token);
                    continue;
                }

                let atom = match pending_op.take() {
                    Some(op) => Comparator::parse(&format!("{}{}", op, token)),
                    None => Comparator::parse(token),
                }
                .map_err(|e| SemverError::InvalidRange {
                    range: s.to_string(),
                    reason: e.to_string(),
                })?;
                atoms.push(atom);
            }

            if let Some(op) = pending_op {
                return Err(SemverError::InvalidRange {
                    range: s.to_string(),
                    reason: format!("dangling operator '{}'", op),
                });
            }

            if atoms.is_empty() {
                return Err(SemverError::InvalidRange {
                    range: s.to_string(),
                    reason: "empty alternative".to_string(),
                });
            }

            alternatives.push(atoms);
        }

        Ok(VersionRange { alternatives })
    }

    /// Check if a version satisfies this range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|atoms| atoms.iter().all(|atom| atom.matches(version)))
    }

    pub fn alternatives(&self) -> &[Vec<Comparator>] {
        &self.alternatives
    }
}

fn is_bare_operator(token: &str) -> bool {
    matches!(token, ">" | ">=" | "<" | "<=" | "!" | "!=" | "=" | "==")
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atoms) in self.alternatives.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            if atoms.is_empty() {
                write!(f, ">=0.0.0")?;
            }
            for (j, atom) in atoms.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", atom)?;
            }
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = SemverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionRange::parse(&s).map_err(serde::de::Error::custom)
    }
}
