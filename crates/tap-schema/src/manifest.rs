//! Formula revision records.
//!
//! A formula revision is one published edit of the install manifest: it names
//! the tool, pins one release version, and lists one download per supported
//! platform. The catalog in `tap-core` folds a sequence of revisions into the
//! current descriptor set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ArtifactDescriptor, DEFAULT_SMOKE_TEST_ARGS, Platform, Sha256Digest, Version,
    platform::{Arch, Os},
};

/// Errors that can occur when validating a [`ManifestRevision`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// A required field is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// A URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL for {platform}: {url}")]
    InvalidUrl {
        /// Platform entry the URL belongs to.
        platform: Platform,
        /// The rejected URL.
        url: String,
    },

    /// The same platform is listed twice in one revision.
    #[error("Duplicate platform {0} in revision")]
    DuplicatePlatform(Platform),

    /// The revision lists no downloads at all.
    #[error("Revision {0} lists no platforms")]
    NoPlatforms(Version),

    /// The installed binary name would escape the install directory.
    #[error("Invalid binary name '{0}': must be a bare file name")]
    InvalidBinaryName(String),
}

/// One platform-specific download inside a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Target operating system.
    pub os: Os,
    /// Target CPU architecture.
    pub arch: Arch,
    /// Download URL of the archive.
    pub url: String,
    /// SHA-256 digest of the archive bytes.
    pub sha256: Sha256Digest,
}

impl PlatformEntry {
    /// The platform this entry targets.
    pub fn platform(&self) -> Platform {
        Platform::new(self.os, self.arch)
    }
}

/// A single formula revision as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRevision {
    /// Tool name (e.g. `netfetch`).
    pub name: String,
    /// One-line human readable description.
    pub description: String,
    /// Project homepage URL.
    pub homepage: String,
    /// Release version this revision publishes.
    pub version: Version,
    /// Name the extracted executable is installed as. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_binary_name: Option<String>,
    /// Arguments the post-install smoke test passes to the binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke_test_args: Option<Vec<String>>,
    /// One download per supported platform.
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,
}

impl ManifestRevision {
    /// Name the executable is installed as, falling back to the tool name.
    pub fn binary_name(&self) -> &str {
        self.installed_binary_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }

    /// Smoke-test arguments, falling back to [`DEFAULT_SMOKE_TEST_ARGS`].
    pub fn effective_smoke_test_args(&self) -> Vec<String> {
        self.smoke_test_args.clone().unwrap_or_else(|| {
            DEFAULT_SMOKE_TEST_ARGS
                .iter()
                .map(ToString::to_string)
                .collect()
        })
    }

    /// Descriptors published by this revision, one per platform entry.
    pub fn descriptors(&self) -> impl Iterator<Item = ArtifactDescriptor> + '_ {
        self.platforms.iter().map(|p| ArtifactDescriptor {
            version: self.version.clone(),
            platform: p.platform(),
            url: p.url.clone(),
            content_hash: p.sha256.clone(),
        })
    }

    /// Validates the revision's integrity by checking all required fields.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an empty metadata field, an empty
    /// platform list, a non-http(s) URL, a platform listed twice, or a binary
    /// name containing a path separator.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyField("name"));
        }
        if self.description.trim().is_empty() {
            return Err(ManifestError::EmptyField("description"));
        }
        if self.homepage.trim().is_empty() {
            return Err(ManifestError::EmptyField("homepage"));
        }
        if self.version.is_empty() {
            return Err(ManifestError::EmptyField("version"));
        }
        if self
            .smoke_test_args
            .as_ref()
            .is_some_and(std::vec::Vec::is_empty)
        {
            return Err(ManifestError::EmptyField("smoke_test_args"));
        }

        let bin = self.binary_name();
        if bin.contains(['/', '\\']) || bin == "." || bin == ".." {
            return Err(ManifestError::InvalidBinaryName(bin.to_string()));
        }

        if self.platforms.is_empty() {
            return Err(ManifestError::NoPlatforms(self.version.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.platforms {
            let platform = entry.platform();
            if !(entry.url.starts_with("https://") || entry.url.starts_with("http://")) {
                return Err(ManifestError::InvalidUrl {
                    platform,
                    url: entry.url.clone(),
                });
            }
            if !seen.insert(platform) {
                return Err(ManifestError::DuplicatePlatform(platform));
            }
        }

        Ok(())
    }
}
