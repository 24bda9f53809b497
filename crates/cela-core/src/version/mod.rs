//! Version model, parsing, and formatting.
//!
//! Fetchers report versions such as `v1.2.3-beta.1+build.5`. This module
//! splits that string into a [`LeadMarker`], the numeric [`SemanticVersion`]
//! core, and the pre-release/build segments that ride along untouched.
//!
//! - [`delta`] - folding increment/decrement directives into a delta
//! - [`transition`] - applying a delta under clamp and reset rules

pub mod delta;
pub mod transition;

use semver::{BuildMetadata, Prerelease};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// A numeric component does not fit in a signed 64-bit integer.
    #[error("{component} component {value} is too large")]
    OutOfRange {
        /// Which component overflowed.
        component: Component,
        /// The parsed value.
        value: u64,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// One of the three numeric version components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// X.y.z
    Major,
    /// x.Y.z
    Minor,
    /// x.y.Z
    Patch,
}

impl Component {
    /// All components, most significant first.
    pub const ALL: [Self; 3] = [Self::Major, Self::Minor, Self::Patch];
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Cosmetic prefix carried over from the fetched version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadMarker {
    /// `v1.2.3`
    #[serde(rename = "v")]
    V,
    /// `=1.2.3`
    #[serde(rename = "=")]
    Equals,
}

impl LeadMarker {
    /// Detect a lead marker from the first character of `raw`.
    pub fn detect(raw: &str) -> Option<Self> {
        match raw.chars().next() {
            Some('v') => Some(Self::V),
            Some('=') => Some(Self::Equals),
            _ => None,
        }
    }

    /// The marker character.
    pub const fn as_char(self) -> char {
        match self {
            Self::V => 'v',
            Self::Equals => '=',
        }
    }
}

/// A semantic version whose numeric core may be adjusted.
///
/// Components are signed so that a transition run with negative clamping
/// disabled can represent its result. Pre-release and build metadata are
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    /// Major component.
    pub major: i64,
    /// Minor component.
    pub minor: i64,
    /// Patch component.
    pub patch: i64,
    /// Pre-release identifiers (without the leading `-`).
    pub pre: Prerelease,
    /// Build metadata (without the leading `+`).
    pub build: BuildMetadata,
}

impl SemanticVersion {
    /// Create a version with no pre-release or build metadata.
    pub const fn new(major: i64, minor: i64, patch: i64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Prerelease::EMPTY,
            build: BuildMetadata::EMPTY,
        }
    }

    /// Read a single component.
    pub const fn get(&self, component: Component) -> i64 {
        match component {
            Component::Major => self.major,
            Component::Minor => self.minor,
            Component::Patch => self.patch,
        }
    }

    /// Overwrite a single component.
    pub const fn set(&mut self, component: Component, value: i64) {
        match component {
            Component::Major => self.major = value,
            Component::Minor => self.minor = value,
            Component::Patch => self.patch = value,
        }
    }

    /// The three numeric components as a tuple.
    pub const fn triple(&self) -> (i64, i64, i64) {
        (self.major, self.minor, self.patch)
    }

    fn from_semver(version: semver::Version) -> VersionResult<Self> {
        let convert = |component, value: u64| {
            i64::try_from(value).map_err(|_| VersionError::OutOfRange { component, value })
        };
        Ok(Self {
            major: convert(Component::Major, version.major)?,
            minor: convert(Component::Minor, version.minor)?,
            patch: convert(Component::Patch, version.patch)?,
            pre: version.pre,
            build: version.build,
        })
    }
}

impl std::fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

/// A version as reported by a fetcher, with its cosmetic lead marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedVersion {
    /// The string exactly as the fetcher reported it.
    pub raw: String,
    /// Leading `v` or `=`, if present.
    pub lead: Option<LeadMarker>,
    /// Parsed version.
    pub version: SemanticVersion,
}

impl FetchedVersion {
    /// Parse a fetcher-reported version string.
    ///
    /// Accepts `MAJOR.MINOR.PATCH[-prerelease][+build]`, optionally prefixed
    /// by `v` or `=`. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> VersionResult<Self> {
        let trimmed = raw.trim();
        let lead = LeadMarker::detect(trimmed);
        let body = match lead {
            Some(marker) => &trimmed[marker.as_char().len_utf8()..],
            None => trimmed,
        };
        let version = SemanticVersion::from_semver(semver::Version::parse(body)?)?;
        Ok(Self {
            raw: raw.to_string(),
            lead,
            version,
        })
    }

    /// Render `version` with this version's lead marker reattached.
    pub fn render(&self, version: &SemanticVersion) -> String {
        format_version(self.lead, version)
    }
}

/// Render a version, prefixed by its lead marker if any.
pub fn format_version(lead: Option<LeadMarker>, version: &SemanticVersion) -> String {
    match lead {
        Some(marker) => format!("{}{version}", marker.as_char()),
        None => version.to_string(),
    }
}
