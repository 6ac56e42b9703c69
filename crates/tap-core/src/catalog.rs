//! The install manifest as a superseding log of descriptors.
//!
//! Formula revisions are applied in publication order. Each revision replaces
//! the tool metadata and, for every platform it lists, the descriptor keyed by
//! `(version, platform)`. Nothing accumulates: one key, one active descriptor.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::formula::{self, FormulaError};
use crate::types::{ArtifactDescriptor, ManifestRevision, Platform, Version};
use tap_schema::ManifestError;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("No formula revisions to build a catalog from")]
    Empty,

    #[error("Revision for '{found}' cannot extend the '{expected}' formula")]
    NameMismatch { expected: String, found: String },

    #[error("Invalid revision {version}: {source}")]
    Invalid {
        version: Version,
        source: ManifestError,
    },

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Current, authoritative install manifest.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    description: String,
    homepage: String,
    binary_name: String,
    smoke_test_args: Vec<String>,
    descriptors: BTreeMap<(Version, Platform), ArtifactDescriptor>,
    release_smoke_args: BTreeMap<Version, Vec<String>>,
    revisions: usize,
}

impl Catalog {
    /// Fold revisions, oldest first, into a catalog.
    pub fn from_revisions(
        revisions: impl IntoIterator<Item = ManifestRevision>,
    ) -> Result<Self, CatalogError> {
        let mut revisions = revisions.into_iter();
        let first = revisions.next().ok_or(CatalogError::Empty)?;
        first.validate().map_err(|source| CatalogError::Invalid {
            version: first.version.clone(),
            source,
        })?;

        let mut catalog = Self {
            name: first.name.clone(),
            description: String::new(),
            homepage: String::new(),
            binary_name: String::new(),
            smoke_test_args: Vec::new(),
            descriptors: BTreeMap::new(),
            release_smoke_args: BTreeMap::new(),
            revisions: 0,
        };
        catalog.apply(first)?;
        for revision in revisions {
            catalog.apply(revision)?;
        }
        Ok(catalog)
    }

    /// The formula history compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_revisions(formula::embedded()?)
    }

    /// The compiled-in history with revisions from `overlay_dir` applied on top.
    pub fn load(overlay_dir: &Path) -> Result<Self, CatalogError> {
        let mut revisions = formula::embedded()?;
        revisions.extend(formula::load_dir(overlay_dir)?);
        Self::from_revisions(revisions)
    }

    /// Apply one more revision on top of the current state.
    pub fn apply(&mut self, revision: ManifestRevision) -> Result<(), CatalogError> {
        revision.validate().map_err(|source| CatalogError::Invalid {
            version: revision.version.clone(),
            source,
        })?;
        if revision.name != self.name {
            return Err(CatalogError::NameMismatch {
                expected: self.name.clone(),
                found: revision.name,
            });
        }

        for descriptor in revision.descriptors() {
            let key = (descriptor.version.clone(), descriptor.platform);
            if let Some(previous) = self.descriptors.insert(key, descriptor) {
                tracing::debug!(
                    version = %previous.version,
                    platform = %previous.platform,
                    url = %previous.url,
                    "descriptor superseded"
                );
            }
        }

        let smoke_args = revision.effective_smoke_test_args();
        self.release_smoke_args
            .insert(revision.version.clone(), smoke_args.clone());

        self.binary_name = revision.binary_name().to_string();
        self.description = revision.description;
        self.homepage = revision.homepage;
        self.smoke_test_args = smoke_args;
        self.revisions += 1;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    /// Name the executable is installed as.
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Smoke-test arguments of the latest revision.
    pub fn smoke_test_args(&self) -> &[String] {
        &self.smoke_test_args
    }

    /// Smoke-test arguments of the revision that published `version`.
    ///
    /// The tool's version flag changed between releases, so an old release is
    /// checked the way its own formula said to check it.
    pub fn smoke_test_args_for(&self, version: &Version) -> &[String] {
        self.release_smoke_args
            .get(version)
            .map_or(self.smoke_test_args.as_slice(), Vec::as_slice)
    }

    /// Number of revisions applied so far.
    pub fn revision_count(&self) -> usize {
        self.revisions
    }

    pub fn get(&self, version: &Version, platform: Platform) -> Option<&ArtifactDescriptor> {
        self.descriptors.get(&(version.clone(), platform))
    }

    pub fn has_version(&self, version: &Version) -> bool {
        self.descriptors.keys().any(|(v, _)| v == version)
    }

    /// Published versions, ascending.
    pub fn versions(&self) -> Vec<&Version> {
        let mut versions: Vec<&Version> = self.descriptors.keys().map(|(v, _)| v).collect();
        versions.dedup();
        versions
    }

    pub fn platforms_for(&self, version: &Version) -> Vec<Platform> {
        self.descriptors
            .keys()
            .filter(|(v, _)| v == version)
            .map(|(_, p)| *p)
            .collect()
    }

    /// Every active descriptor, ordered by version then platform.
    pub fn descriptors(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.descriptors.values()
    }
}
