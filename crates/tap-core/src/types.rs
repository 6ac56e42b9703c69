pub use tap_schema::{
    Arch, ArtifactDescriptor, ArtifactFormat, ManifestRevision, Os, Platform, PlatformEntry,
    Sha256Digest, Version, VersionRequest,
};
