//! Lenient semantic version parsing
//!
//! Accepts what tools actually print: an optional `v` prefix, and partial
//! versions (`8`, `8.0`) whose missing components default to zero. A
//! pre-release (`-beta.1`) is kept; build metadata (`+sha`) is validated and
//! dropped since it never affects ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a string is not a semantic version
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid semantic version {input:?}: {reason}")]
pub struct ParseVersionError {
    input: String,
    reason: &'static str,
}

impl ParseVersionError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A parsed `major.minor.patch[-pre][+build]` version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Pre-release identifiers, empty for a release
    pub pre: Vec<String>,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let rest = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let rest = match rest.split_once('+') {
            Some((rest, build)) => {
                check_identifiers(input, build)?;
                rest
            }
            None => rest,
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => {
                check_identifiers(input, pre)?;
                (core, pre.split('.').map(str::to_string).collect())
            }
            None => (rest, Vec::new()),
        };

        let mut parts = core.split('.');
        let major = parse_component(input, parts.next())?
            .ok_or_else(|| ParseVersionError::new(input, "missing major version"))?;
        let minor = parse_component(input, parts.next())?.unwrap_or(0);
        let patch = parse_component(input, parts.next())?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(ParseVersionError::new(input, "too many components"));
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

fn parse_component(input: &str, part: Option<&str>) -> Result<Option<u64>, ParseVersionError> {
    match part {
        None => Ok(None),
        Some("") => Err(ParseVersionError::new(input, "empty version component")),
        Some(part) if !part.bytes().all(|b| b.is_ascii_digit()) => {
            Err(ParseVersionError::new(input, "non-numeric version component"))
        }
        Some(part) => part
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ParseVersionError::new(input, "version component out of range")),
    }
}

fn check_identifiers(input: &str, identifiers: &str) -> Result<(), ParseVersionError> {
    let valid = identifiers.split('.').all(|id| {
        !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });
    if valid {
        Ok(())
    } else {
        Err(ParseVersionError::new(input, "invalid pre-release or build identifier"))
    }
}

/// Compare pre-release identifier lists; a release sorts after any pre-release
fn compare_pre(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_pre(&self.pre, &other.pre))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        Ok(())
    }
}
