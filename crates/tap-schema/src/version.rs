//! Release version identifiers.

use serde::{Deserialize, Deserializer, Serialize};

/// A release version string.
///
/// Release tags are sometimes `v`-prefixed (`v0.5.3`) while asset names are
/// not (`netfetch_0.5.3_...`), so a single leading `v` is stripped on
/// construction. Ordering is semver-aware; unparseable versions sort after
/// every valid one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.semver(), other.semver()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Version {
    /// Create a new version, stripping a leading `v` tag prefix.
    pub fn new(v: &str) -> Self {
        let v = v.trim();
        let stripped = v
            .strip_prefix('v')
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(v);
        Self(stripped.to_string())
    }

    /// Parsed semver form, if the string is valid semver.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.0).ok()
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the version string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        *self == Self::new(other)
    }
}

/// What a caller asked to install.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VersionRequest {
    /// The highest published version available for the platform.
    #[default]
    Latest,
    /// One specific published version.
    Exact(Version),
}

impl std::fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Exact(v) => write!(f, "{v}"),
        }
    }
}

impl std::str::FromStr for VersionRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("latest") {
            Ok(Self::Latest)
        } else {
            Ok(Self::Exact(Version::new(s)))
        }
    }
}

impl From<Version> for VersionRequest {
    fn from(v: Version) -> Self {
        Self::Exact(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tag_prefix() {
        assert_eq!(Version::new("v0.5.3").as_str(), "0.5.3");
        assert_eq!(Version::new("0.5.3").as_str(), "0.5.3");
        // Only a prefix followed by a digit is a tag prefix.
        assert_eq!(Version::new("vnext").as_str(), "vnext");
    }

    #[test]
    fn semver_ordering_beats_lexical() {
        let mut versions = vec![
            Version::new("0.0.35"),
            Version::new("5.2.5"),
            Version::new("0.5.3"),
            Version::new("0.0.28"),
        ];
        versions.sort();
        let ordered: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(ordered, ["0.0.28", "0.0.35", "0.5.3", "5.2.5"]);
    }

    #[test]
    fn invalid_semver_sorts_last() {
        assert!(Version::new("1.0.0") < Version::new("nightly"));
    }

    #[test]
    fn request_parsing() {
        assert_eq!(
            "latest".parse::<VersionRequest>().unwrap(),
            VersionRequest::Latest
        );
        assert_eq!(
            "v5.2.5".parse::<VersionRequest>().unwrap(),
            VersionRequest::Exact(Version::new("5.2.5"))
        );
    }
}
