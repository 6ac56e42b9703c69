//! Installation Flow Typestate Pattern
//!
//! Models one install as a series of explicit state transitions:
//! `InstallRequest` -> `ResolvedArtifact` -> `FetchedArtifact` ->
//! `VerifiedArtifact` -> `ExtractedArtifact` -> `InstalledArtifact` ->
//! `SmokeTestedArtifact`.
//!
//! Each transition consumes the previous state, so bytes cannot be extracted
//! before they are verified and nothing is written before it is extracted.

use std::path::{Path, PathBuf};

use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::io::download::{self, FetchError, FetchOptions, Fetched};
use crate::io::extract::{self, ExtractError};
use crate::io::install::{self, InstallOptions, PlaceError, Placement};
use crate::io::lock::InstallLock;
use crate::io::smoke::{self, SmokeError};
use crate::reporter::Reporter;
use crate::resolver::{self, ResolveError};
use crate::types::{ArtifactDescriptor, Platform, Sha256Digest, Version, VersionRequest};

/// Where an install operation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStage {
    Requested,
    Resolved,
    Fetched,
    Verified,
    Extracted,
    Installed,
    SmokeTested,
    Done,
}

impl InstallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Resolved => "resolved",
            Self::Fetched => "fetched",
            Self::Verified => "verified",
            Self::Extracted => "extracted",
            Self::Installed => "installed",
            Self::SmokeTested => "smoke-tested",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an install stopped. Every variant names the version and platform.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{source}")]
    UnknownVersion {
        version: VersionRequest,
        platform: Platform,
        source: ResolveError,
    },

    #[error("{source}")]
    UnsupportedPlatform {
        version: VersionRequest,
        platform: Platform,
        source: ResolveError,
    },

    #[error("Download of {version} for {platform} failed: {source}")]
    DownloadFailed {
        version: Version,
        platform: Platform,
        source: FetchError,
    },

    #[error("Integrity check failed for {version} ({platform}): expected {expected}, got {actual}")]
    IntegrityMismatch {
        version: Version,
        platform: Platform,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("Malformed archive for {version} ({platform}): {source}")]
    MalformedArchive {
        version: Version,
        platform: Platform,
        source: ExtractError,
    },

    #[error("Install of {version} ({platform}) failed: {source}")]
    InstallFailed {
        version: Version,
        platform: Platform,
        source: PlaceError,
    },

    #[error("Smoke test of {version} ({platform}) failed: {source}")]
    SmokeTestFailed {
        version: Version,
        platform: Platform,
        source: SmokeError,
    },

    #[error("Install of {version} for {platform} cancelled before {stage}")]
    Cancelled {
        version: VersionRequest,
        platform: Platform,
        stage: InstallStage,
    },
}

impl InstallError {
    fn from_resolve(version: &VersionRequest, platform: Platform, source: ResolveError) -> Self {
        let version = version.clone();
        match source {
            ResolveError::UnknownVersion { .. } | ResolveError::EmptyCatalog => {
                Self::UnknownVersion {
                    version,
                    platform,
                    source,
                }
            }
            ResolveError::UnsupportedPlatform { .. } | ResolveError::NoVersionForPlatform { .. } => {
                Self::UnsupportedPlatform {
                    version,
                    platform,
                    source,
                }
            }
        }
    }

    /// Whether running the whole operation again could succeed.
    ///
    /// Only transport failures qualify; they were already retried with
    /// backoff inside the fetch stage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }

    /// The stage that was being entered when the operation stopped.
    pub fn stage(&self) -> InstallStage {
        match self {
            Self::UnknownVersion { .. } | Self::UnsupportedPlatform { .. } => {
                InstallStage::Resolved
            }
            Self::DownloadFailed { .. } => InstallStage::Fetched,
            Self::IntegrityMismatch { .. } => InstallStage::Verified,
            Self::MalformedArchive { .. } => InstallStage::Extracted,
            Self::InstallFailed { .. } => InstallStage::Installed,
            Self::SmokeTestFailed { .. } => InstallStage::SmokeTested,
            Self::Cancelled { stage, .. } => *stage,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::UnknownVersion { platform, .. }
            | Self::UnsupportedPlatform { platform, .. }
            | Self::DownloadFailed { platform, .. }
            | Self::IntegrityMismatch { platform, .. }
            | Self::MalformedArchive { platform, .. }
            | Self::InstallFailed { platform, .. }
            | Self::SmokeTestFailed { platform, .. }
            | Self::Cancelled { platform, .. } => *platform,
        }
    }
}

/// Step 1: what the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub version: VersionRequest,
    pub platform: Platform,
    /// Run the installed binary afterwards. Only meaningful when `platform`
    /// is the host platform.
    pub smoke_test: bool,
}

impl InstallRequest {
    pub fn new(version: VersionRequest, platform: Platform) -> Self {
        Self {
            version,
            platform,
            smoke_test: true,
        }
    }

    pub fn without_smoke_test(mut self) -> Self {
        self.smoke_test = false;
        self
    }

    /// Pick the descriptor for this request. Pure lookup, no network.
    ///
    /// # Errors
    ///
    /// [`InstallError::UnknownVersion`] or [`InstallError::UnsupportedPlatform`].
    pub fn resolve(self, catalog: &Catalog) -> Result<ResolvedArtifact, InstallError> {
        let descriptor = resolver::resolve(catalog, &self.version, self.platform)
            .map_err(|e| InstallError::from_resolve(&self.version, self.platform, e))?
            .clone();
        let smoke_test_args = catalog.smoke_test_args_for(&descriptor.version).to_vec();

        Ok(ResolvedArtifact {
            binary_name: catalog.binary_name().to_string(),
            smoke_test_args,
            smoke_test: self.smoke_test,
            request: self.version,
            descriptor,
        })
    }
}

/// Step 2: one descriptor chosen.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub request: VersionRequest,
    pub descriptor: ArtifactDescriptor,
    pub binary_name: String,
    pub smoke_test_args: Vec<String>,
    pub smoke_test: bool,
}

/// Step 3: bytes downloaded, digest computed but not yet trusted.
pub struct FetchedArtifact {
    pub resolved: ResolvedArtifact,
    fetched: Fetched,
}

/// Step 4: bytes whose digest matches the descriptor.
pub struct VerifiedArtifact {
    pub resolved: ResolvedArtifact,
    bytes: Vec<u8>,
}

/// Step 5: the executable pulled out of the archive.
pub struct ExtractedArtifact {
    pub resolved: ResolvedArtifact,
    executable: Vec<u8>,
}

/// Step 6: the executable at its target, still holding the lock and the
/// ability to roll back.
pub struct InstalledArtifact {
    pub resolved: ResolvedArtifact,
    placement: Placement,
    lock: InstallLock,
}

/// Step 7: the installed binary ran successfully (or was not asked to).
pub struct SmokeTestedArtifact {
    pub resolved: ResolvedArtifact,
    placement: Placement,
    lock: InstallLock,
    smoke_output: Option<String>,
    skipped: bool,
}

impl ResolvedArtifact {
    pub fn version(&self) -> &Version {
        &self.descriptor.version
    }

    pub fn platform(&self) -> Platform {
        self.descriptor.platform
    }

    /// Download the artifact, retrying transient failures.
    ///
    /// # Errors
    ///
    /// [`InstallError::DownloadFailed`] once retries are exhausted, or
    /// [`InstallError::Cancelled`].
    pub async fn fetch<R: Reporter + ?Sized>(
        self,
        client: &Client,
        opts: FetchOptions,
        reporter: &R,
        cancel: &CancellationToken,
    ) -> Result<FetchedArtifact, InstallError> {
        match download::download(client, &self.descriptor, opts, reporter, cancel).await {
            Ok(fetched) => Ok(FetchedArtifact {
                resolved: self,
                fetched,
            }),
            Err(FetchError::Cancelled) => Err(InstallError::Cancelled {
                version: VersionRequest::Exact(self.descriptor.version.clone()),
                platform: self.platform(),
                stage: InstallStage::Fetched,
            }),
            Err(source) => Err(InstallError::DownloadFailed {
                version: self.descriptor.version.clone(),
                platform: self.platform(),
                source,
            }),
        }
    }
}

impl FetchedArtifact {
    /// Compare the streamed digest with the pinned one.
    ///
    /// # Errors
    ///
    /// [`InstallError::IntegrityMismatch`]; the bytes are dropped unused.
    pub fn verify(self) -> Result<VerifiedArtifact, InstallError> {
        if let Err(FetchError::HashMismatch { expected, actual }) =
            download::verify(&self.resolved.descriptor, &self.fetched)
        {
            return Err(InstallError::IntegrityMismatch {
                version: self.resolved.descriptor.version.clone(),
                platform: self.resolved.platform(),
                expected,
                actual,
            });
        }

        Ok(VerifiedArtifact {
            resolved: self.resolved,
            bytes: self.fetched.bytes,
        })
    }
}

impl VerifiedArtifact {
    /// # Errors
    ///
    /// [`InstallError::MalformedArchive`] unless exactly one executable is found.
    pub fn extract(self) -> Result<ExtractedArtifact, InstallError> {
        let format = self.resolved.descriptor.format();
        match extract::extract_executable(&self.bytes, format, &self.resolved.binary_name) {
            Ok(executable) => Ok(ExtractedArtifact {
                resolved: self.resolved,
                executable,
            }),
            Err(source) => Err(InstallError::MalformedArchive {
                version: self.resolved.descriptor.version.clone(),
                platform: self.resolved.platform(),
                source,
            }),
        }
    }
}

impl ExtractedArtifact {
    /// Lock `target` and atomically place the executable there.
    ///
    /// # Errors
    ///
    /// [`InstallError::InstallFailed`] if the lock cannot be taken or the
    /// write fails. The target is left as it was.
    pub async fn install(
        self,
        target: &Path,
        opts: InstallOptions,
    ) -> Result<InstalledArtifact, InstallError> {
        let failed = |source: PlaceError| InstallError::InstallFailed {
            version: self.resolved.descriptor.version.clone(),
            platform: self.resolved.platform(),
            source,
        };

        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir).map_err(|source| {
                failed(PlaceError::Io {
                    action: "create",
                    path: dir.to_path_buf(),
                    source,
                })
            })?;
        }

        let lock = InstallLock::acquire(target, opts.lock_timeout, opts.stale_lock_after)
            .await
            .map_err(|e| failed(e.into()))?;
        let placement = install::place_executable(&self.executable, target).map_err(failed)?;

        Ok(InstalledArtifact {
            resolved: self.resolved,
            placement,
            lock,
        })
    }
}

impl InstalledArtifact {
    pub fn target(&self) -> &Path {
        self.placement.target()
    }

    /// Run the installed binary with the formula's smoke-test arguments.
    ///
    /// # Errors
    ///
    /// [`InstallError::SmokeTestFailed`], after the target has been rolled
    /// back to what it held before the install.
    pub async fn smoke_test(
        self,
        timeout: std::time::Duration,
    ) -> Result<SmokeTestedArtifact, InstallError> {
        if !self.resolved.smoke_test {
            return Ok(SmokeTestedArtifact {
                resolved: self.resolved,
                placement: self.placement,
                lock: self.lock,
                smoke_output: None,
                skipped: true,
            });
        }

        let binary = self.placement.target().to_path_buf();
        let args = self.resolved.smoke_test_args.clone();
        let result = tokio::task::spawn_blocking(move || {
            smoke::run_smoke_test(&binary, &args, timeout)
        })
        .await
        .unwrap_or_else(|e| Err(SmokeError::Io(std::io::Error::other(e))));

        match result {
            Ok(output) => Ok(SmokeTestedArtifact {
                resolved: self.resolved,
                placement: self.placement,
                lock: self.lock,
                smoke_output: Some(output.first_line().to_string()),
                skipped: false,
            }),
            Err(source) => {
                if let Err(e) = self.placement.rollback() {
                    tracing::error!(error = %e, "rollback after failed smoke test failed");
                }
                drop(self.lock);
                Err(InstallError::SmokeTestFailed {
                    version: self.resolved.descriptor.version.clone(),
                    platform: self.resolved.platform(),
                    source,
                })
            }
        }
    }
}

impl SmokeTestedArtifact {
    /// Whether the smoke test was skipped rather than passed.
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Keep the new binary, drop the backup and release the lock.
    pub fn finish(self, stages: Vec<InstallStage>) -> InstallReport {
        let target = self.placement.target().to_path_buf();
        let replaced_existing = self.placement.replaced_existing();
        self.placement.commit();
        drop(self.lock);

        InstallReport {
            version: self.resolved.descriptor.version,
            platform: self.resolved.descriptor.platform,
            url: self.resolved.descriptor.url,
            content_hash: self.resolved.descriptor.content_hash,
            target,
            replaced_existing,
            smoke_output: self.smoke_output,
            smoke_skipped: self.skipped,
            stages,
        }
    }
}

/// Outcome of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: Version,
    pub platform: Platform,
    pub url: String,
    pub content_hash: Sha256Digest,
    pub target: PathBuf,
    pub replaced_existing: bool,
    /// First line the smoke test printed; `None` when it was skipped.
    pub smoke_output: Option<String>,
    /// The binary was installed without running it.
    pub smoke_skipped: bool,
    /// Every stage entered, in order, ending with `Done`. `SmokeTested` is
    /// absent when the smoke test was skipped.
    pub stages: Vec<InstallStage>,
}

/// Runs install requests against one catalog and install directory.
pub struct Installer<R: Reporter> {
    catalog: Catalog,
    config: Config,
    client: Client,
    reporter: R,
    cancel: CancellationToken,
}

impl<R: Reporter> Installer<R> {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(catalog: Catalog, config: Config, reporter: R) -> Result<Self, reqwest::Error> {
        let client = config.http_client()?;
        Ok(Self {
            catalog,
            config,
            client,
            reporter,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future installs when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the binary lands for `platform`.
    pub fn target_path(&self, platform: Platform) -> PathBuf {
        let name = format!(
            "{}{}",
            self.catalog.binary_name(),
            platform.os.executable_suffix()
        );
        self.config.bin_dir().join(name)
    }

    /// Resolve without fetching anything.
    ///
    /// # Errors
    ///
    /// As [`InstallRequest::resolve`].
    pub fn plan(&self, request: InstallRequest) -> Result<ResolvedArtifact, InstallError> {
        request.resolve(&self.catalog)
    }

    /// Run the full pipeline for `request`.
    ///
    /// # Errors
    ///
    /// The first [`InstallError`] hit. Nothing is left half-installed.
    pub async fn install(&self, request: InstallRequest) -> Result<InstallReport, InstallError> {
        let label = request.version.clone();
        let platform = request.platform;
        let span = tracing::info_span!("install", version = %label, %platform);

        self.reporter.section(&format!(
            "Installing {} {label} for {platform}",
            self.catalog.name()
        ));

        let result = self.run(request).instrument(span).await;
        if let Err(e) = &result {
            tracing::error!(stage = %e.stage(), error = %e, "install failed");
            match e {
                InstallError::DownloadFailed { version, .. }
                | InstallError::IntegrityMismatch { version, .. }
                | InstallError::MalformedArchive { version, .. }
                | InstallError::InstallFailed { version, .. }
                | InstallError::SmokeTestFailed { version, .. } => {
                    self.reporter.failed(version, &e.to_string());
                }
                _ => self.reporter.warning(&e.to_string()),
            }
        }
        result
    }

    async fn run(&self, request: InstallRequest) -> Result<InstallReport, InstallError> {
        let mut stages = vec![InstallStage::Requested];
        let platform = request.platform;
        self.check_cancelled(&request.version, platform, InstallStage::Resolved)?;

        let resolved = request.resolve(&self.catalog)?;
        let version = resolved.version().clone();
        self.enter(&mut stages, &version, InstallStage::Resolved);
        tracing::debug!(url = %resolved.descriptor.url, "resolved artifact");

        let fetched = resolved
            .fetch(
                &self.client,
                self.config.fetch_options(),
                &self.reporter,
                &self.cancel,
            )
            .await?;
        self.enter(&mut stages, &version, InstallStage::Fetched);

        let verified = fetched.verify()?;
        self.enter(&mut stages, &version, InstallStage::Verified);

        let extracted = verified.extract()?;
        self.enter(&mut stages, &version, InstallStage::Extracted);

        // Past this point the operation completes or rolls back.
        self.check_cancelled(
            &VersionRequest::Exact(version.clone()),
            platform,
            InstallStage::Installed,
        )?;
        let target = self.target_path(platform);
        let installed = extracted
            .install(&target, self.config.install_options())
            .await?;
        self.enter(&mut stages, &version, InstallStage::Installed);

        let tested = installed
            .smoke_test(self.config.smoke_test_timeout())
            .await?;
        if tested.skipped() {
            tracing::warn!("smoke test skipped");
        } else {
            self.enter(&mut stages, &version, InstallStage::SmokeTested);
        }

        stages.push(InstallStage::Done);
        let report = tested.finish(stages);
        self.reporter.stage(&version, InstallStage::Done);
        self.reporter
            .done(&version, &report.target.display().to_string());
        tracing::info!(target_path = %report.target.display(), "install complete");
        Ok(report)
    }

    fn enter(&self, stages: &mut Vec<InstallStage>, version: &Version, stage: InstallStage) {
        stages.push(stage);
        self.reporter.stage(version, stage);
        tracing::info!(%stage, "stage complete");
    }

    fn check_cancelled(
        &self,
        version: &VersionRequest,
        platform: Platform,
        stage: InstallStage,
    ) -> Result<(), InstallError> {
        if self.cancel.is_cancelled() {
            Err(InstallError::Cancelled {
                version: version.clone(),
                platform,
                stage,
            })
        } else {
            Ok(())
        }
    }
}
