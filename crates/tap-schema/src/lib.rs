//! Shared types for tap formulas.
//!
//! Everything a formula revision carries on disk, and everything the resolver
//! hands back to callers, lives here so that the core engine and the CLI agree
//! on a single wire shape.

pub mod descriptor;
pub mod hash;
pub mod manifest;
pub mod platform;
pub mod version;

// Re-exports
pub use descriptor::{ArtifactDescriptor, ArtifactFormat};
pub use hash::Sha256Digest;
pub use manifest::{ManifestError, ManifestRevision, PlatformEntry};
pub use platform::{Arch, Os, Platform, PlatformError};
pub use version::{Version, VersionRequest};

/// Smoke-test arguments assumed when a formula revision does not declare any.
pub const DEFAULT_SMOKE_TEST_ARGS: &[&str] = &["--version"];
