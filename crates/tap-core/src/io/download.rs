//! Artifact download with streaming SHA-256 and bounded retries.
//!
//! Transient failures (connection errors, timeouts, 5xx and 429 responses)
//! are retried with exponential backoff and jitter. Everything else fails on
//! the first attempt. The bytes are held in memory; nothing touches the
//! filesystem until the digest has been checked.

use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::Reporter;
use crate::types::{ArtifactDescriptor, Sha256Digest};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("Download cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            Self::HashMismatch { .. } | Self::Cancelled => false,
        }
    }
}

/// Retry policy for [`download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Bytes of a downloaded artifact and the digest computed while streaming.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub digest: Sha256Digest,
}

/// Download the artifact behind `descriptor`, retrying transient failures.
///
/// The digest is computed but not compared; see [`verify`].
///
/// # Errors
///
/// Returns the last error once retries are exhausted, the first
/// non-transient error, or [`FetchError::Cancelled`] as soon as `cancel` fires.
pub async fn download<R: Reporter + ?Sized>(
    client: &Client,
    descriptor: &ArtifactDescriptor,
    opts: FetchOptions,
    reporter: &R,
    cancel: &CancellationToken,
) -> Result<Fetched, FetchError> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let result = tokio::select! {
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            r = download_once(client, descriptor, reporter) => r,
        };

        match result {
            Ok(fetched) => return Ok(fetched),
            Err(e) if e.is_transient() && attempt < opts.max_retries => {
                let delay = retry_delay(opts.base_delay, attempt);
                attempt += 1;
                tracing::warn!(
                    url = %descriptor.url,
                    attempt,
                    max_retries = opts.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "download failed, retrying"
                );
                reporter.warning(&format!(
                    "Download failed ({e}), retrying ({attempt}/{})",
                    opts.max_retries
                ));
                tokio::select! {
                    () = cancel.cancelled() => return Err(FetchError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

async fn download_once<R: Reporter + ?Sized>(
    client: &Client,
    descriptor: &ArtifactDescriptor,
    reporter: &R,
) -> Result<Fetched, FetchError> {
    tracing::debug!(url = %descriptor.url, "requesting artifact");
    let response = client.get(&descriptor.url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status,
            url: descriptor.url.clone(),
        });
    }

    let total = response.content_length();
    let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    reporter.downloading(&descriptor.version, 0, total);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        bytes.extend_from_slice(&chunk);
        reporter.downloading(&descriptor.version, bytes.len() as u64, total);
    }

    Ok(Fetched {
        bytes,
        digest: Sha256Digest::from_hasher(hasher),
    })
}

/// Compare the streamed digest against the one the descriptor pins.
///
/// # Errors
///
/// Returns [`FetchError::HashMismatch`] when they differ.
pub fn verify(descriptor: &ArtifactDescriptor, fetched: &Fetched) -> Result<(), FetchError> {
    if fetched.digest == descriptor.content_hash {
        Ok(())
    } else {
        Err(FetchError::HashMismatch {
            expected: descriptor.content_hash.clone(),
            actual: fetched.digest.clone(),
        })
    }
}

/// [`download`] followed by [`verify`].
///
/// # Errors
///
/// Any error of either step.
pub async fn fetch<R: Reporter + ?Sized>(
    client: &Client,
    descriptor: &ArtifactDescriptor,
    opts: FetchOptions,
    reporter: &R,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, FetchError> {
    let fetched = download(client, descriptor, opts, reporter, cancel).await?;
    verify(descriptor, &fetched)?;
    Ok(fetched.bytes)
}

/// Exponential backoff with +/- 25% jitter.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let delay = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    Duration::from_millis(delay - jitter_range + jitter)
}
