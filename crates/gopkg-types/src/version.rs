//! Version identifiers used in import paths and ref names.
//!
//! A version is written `vN`, `vN.M` or `vN.M.P`, optionally followed by
//! `-unstable`. Numeric components never carry leading zeros, except for
//! the literal `0` itself.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

/// Suffix marking a version as not suitable for released code.
pub const UNSTABLE_SUFFIX: &str = "-unstable";

/// Errors produced when parsing a [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The text does not start with `v`.
    #[error("version {0:?} must start with 'v'")]
    MissingPrefix(String),

    /// A numeric component is empty, non-numeric, zero-padded or too large.
    #[error("invalid component {component:?} in version {input:?}")]
    InvalidComponent {
        /// The full text being parsed.
        input: String,
        /// The offending component.
        component: String,
    },

    /// More than three numeric components.
    #[error("version {0:?} has more than three components")]
    TooManyComponents(String),
}

/// A version identifier.
///
/// Unset trailing components are kept unset: `v1` is not `v1.0.0`, and
/// formatting a parsed version reproduces the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: Option<u32>,
    minor: Option<u32>,
    patch: Option<u32>,
    unstable: bool,
}

impl Version {
    /// Sentinel for "no matching version". Never matches anything.
    pub const INVALID: Version = Version {
        major: None,
        minor: None,
        patch: None,
        unstable: false,
    };

    /// Creates a stable major-only version.
    pub const fn new(major: u32) -> Self {
        Self {
            major: Some(major),
            minor: None,
            patch: None,
            unstable: false,
        }
    }

    /// Sets the minor component.
    pub const fn with_minor(self, minor: u32) -> Self {
        Self {
            minor: Some(minor),
            ..self
        }
    }

    /// Sets the patch component. Has no effect unless the minor component is set.
    pub const fn with_patch(self, patch: u32) -> Self {
        match self.minor {
            Some(_) => Self {
                patch: Some(patch),
                ..self
            },
            None => self,
        }
    }

    /// Sets the unstable flag.
    pub const fn with_unstable(self, unstable: bool) -> Self {
        Self { unstable, ..self }
    }

    /// Parses a version, returning `None` for anything that is not version-shaped.
    pub fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    pub const fn major(&self) -> Option<u32> {
        self.major
    }

    pub const fn minor(&self) -> Option<u32> {
        self.minor
    }

    pub const fn patch(&self) -> Option<u32> {
        self.patch
    }

    pub const fn is_unstable(&self) -> bool {
        self.unstable
    }

    /// Returns true unless this is [`Version::INVALID`].
    pub const fn is_valid(&self) -> bool {
        self.major.is_some()
    }

    /// Drops the minor and patch components, keeping the unstable flag.
    pub const fn major_only(self) -> Self {
        Self {
            minor: None,
            patch: None,
            ..self
        }
    }

    /// Compares (major, minor, patch) numerically. An unset component sorts
    /// before any set one. The unstable flag is ignored.
    pub fn precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }

    /// Returns true if `self` sorts strictly before `other`.
    pub fn less(&self, other: &Self) -> bool {
        self.precedence(other) == Ordering::Less
    }

    /// Returns true if `candidate` satisfies `self` used as a constraint.
    ///
    /// Every component set on the constraint must be equal on the candidate,
    /// and the unstable flags must match. An invalid constraint matches nothing.
    pub fn contains(&self, candidate: &Self) -> bool {
        fn matches(constraint: Option<u32>, candidate: Option<u32>) -> bool {
            constraint.is_none() || constraint == candidate
        }

        self.is_valid()
            && self.major == candidate.major
            && matches(self.minor, candidate.minor)
            && matches(self.patch, candidate.patch)
            && self.unstable == candidate.unstable
    }
}

fn parse_component(component: &str, input: &str) -> Result<u32, VersionError> {
    let invalid = || VersionError::InvalidComponent {
        input: input.to_string(),
        component: component.to_string(),
    };

    let digits_only = !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (component.len() > 1 && component.starts_with('0')) {
        return Err(invalid());
    }
    component.parse().map_err(|_| invalid())
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('v')
            .ok_or_else(|| VersionError::MissingPrefix(s.to_string()))?;
        let (numbers, unstable) = match rest.strip_suffix(UNSTABLE_SUFFIX) {
            Some(numbers) => (numbers, true),
            None => (rest, false),
        };

        let mut parts = numbers.split('.');
        let major = parse_component(parts.next().unwrap_or_default(), s)?;
        let minor = parts.next().map(|p| parse_component(p, s)).transpose()?;
        let patch = parts.next().map(|p| parse_component(p, s)).transpose()?;
        if parts.next().is_some() {
            return Err(VersionError::TooManyComponents(s.to_string()));
        }

        Ok(Self {
            major: Some(major),
            minor,
            patch,
            unstable,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(major) = self.major else {
            return f.write_str("invalid");
        };
        write!(f, "v{major}")?;
        if let Some(minor) = self.minor {
            write!(f, ".{minor}")?;
            if let Some(patch) = self.patch {
                write!(f, ".{patch}")?;
            }
        }
        if self.unstable {
            f.write_str(UNSTABLE_SUFFIX)?;
        }
        Ok(())
    }
}

/// A list of versions in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionList(Vec<Version>);

impl VersionList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a version.
    pub fn push(&mut self, version: Version) {
        self.0.push(version);
    }

    /// Stable sort, oldest first.
    pub fn sort(&mut self) {
        self.0.sort_by(Version::precedence);
    }

    /// Stable sort, newest first.
    pub fn sort_reverse(&mut self) {
        self.0.sort_by(|a, b| b.precedence(a));
    }

    /// The greatest stable version of every major, newest major first.
    pub fn latest_per_major(&self) -> VersionList {
        let mut latest: Vec<Version> = Vec::new();
        for version in self.0.iter().filter(|v| v.is_valid() && !v.is_unstable()) {
            match latest.iter_mut().find(|l| l.major == version.major) {
                Some(current) if current.less(version) => *current = *version,
                Some(_) => {}
                None => latest.push(*version),
            }
        }
        let mut list = VersionList(latest);
        list.sort_reverse();
        list
    }

    /// Consumes the list, returning the versions.
    pub fn into_inner(self) -> Vec<Version> {
        self.0
    }
}

impl Deref for VersionList {
    type Target = [Version];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Version>> for VersionList {
    fn from(versions: Vec<Version>) -> Self {
        Self(versions)
    }
}

impl FromIterator<Version> for VersionList {
    fn from_iter<I: IntoIterator<Item = Version>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a VersionList {
    type Item = &'a Version;
    type IntoIter = std::slice::Iter<'a, Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
