//! Advisory lock serialising installs to one target path.
//!
//! The lock is a sibling `<target>.lock` file created with `create_new`. It
//! records the holder's pid and start time so a lock left behind by a killed
//! process can be recognised by age and reclaimed. Reclaiming happens under a
//! second `<target>.lock.reclaim` guard, so a waiter that judged a lock stale
//! cannot delete a fresh lock another waiter created in the meantime.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Timed out after {}s waiting for {} (held by {holder})", .waited.as_secs(), .path.display())]
    Timeout {
        path: PathBuf,
        holder: String,
        waited: Duration,
    },

    #[error("IO error on lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Holder details parsed from an existing lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LockOwner {
    pid: Option<u32>,
    started_at: Option<DateTime<Utc>>,
}

impl LockOwner {
    fn parse(raw: &str) -> Self {
        let mut owner = Self::default();
        for token in raw.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "pid" => owner.pid = value.parse().ok(),
                "started_at" => {
                    owner.started_at = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|t| t.with_timezone(&Utc));
                }
                _ => {}
            }
        }
        owner
    }

    fn describe(&self) -> String {
        match (self.pid, self.started_at) {
            (Some(pid), Some(at)) => format!("pid {pid} since {}", at.to_rfc3339()),
            (Some(pid), None) => format!("pid {pid}"),
            _ => "unknown process".to_string(),
        }
    }
}

/// Exclusive ownership of an install target. Released on drop.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    /// Wait up to `timeout` for the lock on `target`.
    ///
    /// A lock older than `stale_after` is removed and the attempt repeated.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if another holder keeps the lock, and
    /// [`LockError::Io`] if the lock file cannot be created or inspected.
    pub async fn acquire(
        target: &Path,
        timeout: Duration,
        stale_after: Duration,
    ) -> Result<Self, LockError> {
        let path = crate::lock_path_for(target);
        let started = tokio::time::Instant::now();

        loop {
            match Self::try_create(&path) {
                Ok(lock) => {
                    tracing::debug!(lock = %path.display(), "acquired install lock");
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(source) => return Err(LockError::Io { path, source }),
            }

            let (owner, age) = inspect(&path).map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

            if age.is_some_and(|a| a >= stale_after) {
                match reclaim(&path, &owner, stale_after) {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(source) => return Err(LockError::Io { path, source }),
                }
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(LockError::Timeout {
                    path,
                    holder: owner.describe(),
                    waited,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
        }
    }

    fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(
            file,
            "pid={} started_at={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        )?;
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release install lock");
        }
    }
}

/// Remove the lock at `path` if it still belongs to the stale `seen` holder.
///
/// Returns `false` when another waiter holds the reclaim guard, so the caller
/// goes back to polling.
fn reclaim(path: &Path, seen: &LockOwner, stale_after: Duration) -> std::io::Result<bool> {
    let mut guard_name = path.as_os_str().to_os_string();
    guard_name.push(".reclaim");
    let guard_path = PathBuf::from(guard_name);

    let _guard = match InstallLock::try_create(&guard_path) {
        Ok(guard) => guard,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // A guard outliving the stale window was left by a crashed waiter.
            let (_, age) = inspect(&guard_path)?;
            if age.is_some_and(|a| a >= stale_after) {
                remove_if_present(&guard_path)?;
            }
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let (owner, age) = inspect(path)?;
    if owner == *seen && age.is_some_and(|a| a >= stale_after) {
        tracing::warn!(
            lock = %path.display(),
            holder = %owner.describe(),
            "reclaiming stale install lock"
        );
        remove_if_present(path)?;
    } else {
        tracing::debug!(lock = %path.display(), "lock changed hands before reclaim");
    }
    Ok(true)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Holder and age of an existing lock. A vanished lock has no age.
fn inspect(path: &Path) -> std::io::Result<(LockOwner, Option<Duration>)> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((LockOwner::default(), None)),
        Err(e) => return Err(e),
    };
    let owner = LockOwner::parse(&raw);

    let age = if let Some(at) = owner.started_at {
        (Utc::now() - at).to_std().ok()
    } else {
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now().duration_since(modified).ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        }
    };

    Ok((owner, age))
}
