//! Resolved download descriptors.

use serde::{Deserialize, Serialize};

use crate::{Platform, Sha256Digest, Version};

/// Binds one published (version, platform) pair to a download location and
/// the digest that pins its bytes.
///
/// Descriptors are immutable once published: a later formula revision may
/// replace the descriptor for a key, but never edits it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Release version this artifact belongs to.
    pub version: Version,
    /// Platform the artifact was built for.
    pub platform: Platform,
    /// Download URL of the archive.
    pub url: String,
    /// Expected SHA-256 digest of the archive bytes.
    pub content_hash: Sha256Digest,
}

impl ArtifactDescriptor {
    /// Last path segment of the URL, e.g. `netfetch_5.2.5_linux_amd64.tar.gz`.
    pub fn file_name(&self) -> &str {
        self.url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Archive format inferred from the URL.
    pub fn format(&self) -> ArtifactFormat {
        ArtifactFormat::from_file_name(self.file_name())
    }
}

/// Archive or binary format of a downloadable artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
    /// Standalone executable with no archive wrapper.
    Binary,
}

impl ArtifactFormat {
    /// Detect the format from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar") {
            Self::Tar
        } else if name.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Binary
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TarGz => "tar.gz",
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Binary => "binary",
        };
        write!(f, "{s}")
    }
}
