//! Version and platform resolution against the catalog.
//!
//! Resolution is a pure lookup: it never guesses a version, never substitutes
//! a neighbouring platform, and never touches the network.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::types::{ArtifactDescriptor, Platform, Version, VersionRequest};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unknown version {version} (published: {published})")]
    UnknownVersion { version: Version, published: String },

    #[error("Version {version} has no build for {platform} (available: {available})")]
    UnsupportedPlatform {
        version: Version,
        platform: Platform,
        available: String,
    },

    #[error("No published version supports {platform}")]
    NoVersionForPlatform { platform: Platform },

    #[error("The catalog publishes no versions")]
    EmptyCatalog,
}

/// Find the single descriptor for `request` on `platform`.
///
/// `Latest` picks the highest published version that has a build for
/// `platform`. An exact version must be published and must list `platform`.
///
/// # Errors
///
/// [`ResolveError::UnknownVersion`] if the exact version was never published,
/// [`ResolveError::UnsupportedPlatform`] if it was but not for `platform`.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    request: &VersionRequest,
    platform: Platform,
) -> Result<&'a ArtifactDescriptor, ResolveError> {
    match request {
        VersionRequest::Exact(version) => resolve_exact(catalog, version, platform),
        VersionRequest::Latest => resolve_latest(catalog, platform),
    }
}

fn resolve_exact<'a>(
    catalog: &'a Catalog,
    version: &Version,
    platform: Platform,
) -> Result<&'a ArtifactDescriptor, ResolveError> {
    if let Some(descriptor) = catalog.get(version, platform) {
        return Ok(descriptor);
    }

    if catalog.has_version(version) {
        Err(ResolveError::UnsupportedPlatform {
            version: version.clone(),
            platform,
            available: join(catalog.platforms_for(version)),
        })
    } else {
        Err(ResolveError::UnknownVersion {
            version: version.clone(),
            published: join(catalog.versions()),
        })
    }
}

fn resolve_latest(
    catalog: &Catalog,
    platform: Platform,
) -> Result<&ArtifactDescriptor, ResolveError> {
    if catalog.versions().is_empty() {
        return Err(ResolveError::EmptyCatalog);
    }

    catalog
        .descriptors()
        .filter(|d| d.platform == platform)
        .max_by(|a, b| a.version.cmp(&b.version))
        .ok_or(ResolveError::NoVersionForPlatform { platform })
}

fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let joined = items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}
