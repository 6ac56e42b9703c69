//! TOML formula revision parsing
//!
//! Revisions ship embedded in the binary (the published formula history) and
//! can be overlaid from a directory of `*.toml` files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::ManifestRevision;
use tap_schema::ManifestError;

/// The published formula history, oldest first.
const EMBEDDED: &[(&str, &str)] = &[
    (
        "netfetch-0.0.28.toml",
        include_str!("../formula/netfetch-0.0.28.toml"),
    ),
    (
        "netfetch-0.0.35.toml",
        include_str!("../formula/netfetch-0.0.35.toml"),
    ),
    (
        "netfetch-0.5.3.toml",
        include_str!("../formula/netfetch-0.5.3.toml"),
    ),
    (
        "netfetch-5.2.5.toml",
        include_str!("../formula/netfetch-5.2.5.toml"),
    ),
];

/// Errors that can occur when loading a formula revision.
#[derive(Error, Debug)]
pub enum FormulaError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },

    #[error("Invalid formula {origin}: {source}")]
    Invalid {
        origin: String,
        source: ManifestError,
    },
}

/// Parse and validate a revision from a TOML string.
///
/// `origin` names the source (file name or path) in error messages.
///
/// # Errors
///
/// Returns [`FormulaError::Parse`] for malformed TOML or an invalid hash, and
/// [`FormulaError::Invalid`] when the record fails validation.
pub fn parse_revision(content: &str, origin: &str) -> Result<ManifestRevision, FormulaError> {
    let revision: ManifestRevision =
        toml::from_str(content).map_err(|source| FormulaError::Parse {
            origin: origin.to_string(),
            source,
        })?;
    revision.validate().map_err(|source| FormulaError::Invalid {
        origin: origin.to_string(),
        source,
    })?;
    Ok(revision)
}

/// Parse a revision from a TOML file on disk.
///
/// # Errors
///
/// Returns [`FormulaError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse_revision`].
pub fn from_file(path: &Path) -> Result<ManifestRevision, FormulaError> {
    let content = fs::read_to_string(path).map_err(|source| FormulaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_revision(&content, &path.display().to_string())
}

/// The formula history compiled into this binary, oldest first.
///
/// # Errors
///
/// Only fails if an embedded file is broken, which the tests below rule out.
pub fn embedded() -> Result<Vec<ManifestRevision>, FormulaError> {
    EMBEDDED
        .iter()
        .map(|(name, content)| parse_revision(content, name))
        .collect()
}

/// Load every `*.toml` revision in `dir`, in publication order.
///
/// Publication order is ascending version; revisions of the same version are
/// ordered by file name, so `netfetch-1.0.0-r2.toml` supersedes
/// `netfetch-1.0.0.toml`. A missing directory yields no revisions.
///
/// # Errors
///
/// Fails on the first unreadable or invalid file.
pub fn load_dir(dir: &Path) -> Result<Vec<ManifestRevision>, FormulaError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|source| FormulaError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut revisions = paths
        .iter()
        .map(|p| from_file(p))
        .collect::<Result<Vec<_>, _>>()?;
    // Stable sort keeps file-name order among equal versions.
    revisions.sort_by(|a, b| a.version.cmp(&b.version));

    tracing::debug!(dir = %dir.display(), count = revisions.len(), "loaded formula revisions");
    Ok(revisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_history_parses() {
        let revisions = embedded().unwrap();
        let versions: Vec<&str> = revisions.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, ["0.0.28", "0.0.35", "0.5.3", "5.2.5"]);
        assert!(revisions.iter().all(|r| r.name == "netfetch"));
    }

    #[test]
    fn smoke_form_changes_across_history() {
        let revisions = embedded().unwrap();
        assert_eq!(revisions[0].effective_smoke_test_args(), ["--version"]);
        assert_eq!(revisions[3].effective_smoke_test_args(), ["version"]);
    }

    #[test]
    fn load_dir_orders_by_version_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = EMBEDDED[3].1;
        fs::write(dir.path().join("b.toml"), base).unwrap();
        fs::write(
            dir.path().join("a.toml"),
            base.replace("5.2.5", "5.3.0"),
        )
        .unwrap();
        fs::write(dir.path().join("c.toml"), base).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let revisions = load_dir(dir.path()).unwrap();
        let versions: Vec<&str> = revisions.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, ["5.2.5", "5.2.5", "5.3.0"]);
    }

    #[test]
    fn load_dir_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dir(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn invalid_revision_names_origin() {
        let err = parse_revision(
            &EMBEDDED[0].1.replace("homepage = \"https://github.com/deggja/netfetch\"", "homepage = \"\""),
            "broken.toml",
        )
        .unwrap_err();
        assert!(matches!(err, FormulaError::Invalid { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
