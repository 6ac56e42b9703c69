//! Atomic placement of the executable at its install path.
//!
//! The new binary is written to a temporary file in the target directory,
//! made executable, synced and renamed over the target. Whatever already sits
//! at the target is kept in a sibling backup first (regular files by hard
//! link, symlinks as a copy of the link), so the placement can be undone until
//! it is committed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::io::lock::LockError;

/// Locking policy for installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// How long to wait for a concurrent install of the same target.
    pub lock_timeout: Duration,
    /// Age after which a leftover lock is reclaimed.
    pub stale_lock_after: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(60),
            stale_lock_after: Duration::from_secs(600),
        }
    }
}

#[derive(Error, Debug)]
pub enum PlaceError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

fn io_err<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> PlaceError + 'a {
    move |source| PlaceError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// A binary written to its target that can still be rolled back.
///
/// Dropping an uncommitted placement rolls it back.
#[derive(Debug)]
pub struct Placement {
    target: PathBuf,
    backup: Option<PathBuf>,
    /// The new binary has been renamed over the target.
    switched: bool,
    finished: bool,
}

impl Placement {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether a previous binary was replaced.
    pub fn replaced_existing(&self) -> bool {
        self.backup.is_some()
    }

    /// Keep the new binary and discard the backup.
    pub fn commit(mut self) {
        self.finished = true;
        if let Some(backup) = self.backup.take() {
            if let Err(e) = fs::remove_file(&backup) {
                tracing::warn!(backup = %backup.display(), error = %e, "failed to remove backup");
            }
        }
    }

    /// Put the target back the way it was before [`place_executable`].
    ///
    /// # Errors
    ///
    /// Returns an error if the previous binary cannot be restored or the new
    /// one cannot be removed.
    pub fn rollback(mut self) -> Result<(), PlaceError> {
        self.finished = true;
        self.restore()
    }

    fn restore(&mut self) -> Result<(), PlaceError> {
        match self.backup.take() {
            // Never switched: the original is still in place next to its backup.
            Some(backup) if !self.switched && fs::symlink_metadata(&self.target).is_ok() => {
                match fs::remove_file(&backup) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(io_err("remove", &backup)(e)),
                }
            }
            Some(backup) => {
                tracing::warn!(path = %self.target.display(), "restoring previous binary");
                fs::rename(&backup, &self.target).map_err(io_err("restore", &self.target))
            }
            None if !self.switched => Ok(()),
            None => {
                tracing::warn!(path = %self.target.display(), "removing new binary");
                match fs::remove_file(&self.target) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(io_err("remove", &self.target)(e)),
                }
            }
        }
    }
}

impl Drop for Placement {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.restore() {
                tracing::error!(error = %e, "rollback of abandoned install failed");
            }
        }
    }
}

/// Write `bytes` to `target` as an executable, atomically.
///
/// Running this twice with the same bytes leaves the same state as once.
///
/// # Errors
///
/// Any filesystem failure. On error the target is left as it was.
pub fn place_executable(bytes: &[u8], target: &Path) -> Result<Placement, PlaceError> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_err("create", dir))?;

    let backup = backup_existing(target)?;
    // From here on a failure must put the backup back.
    let mut placement = Placement {
        target: target.to_path_buf(),
        backup,
        switched: false,
        finished: false,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err("create temp file in", dir))?;
    tmp.write_all(bytes).map_err(io_err("write", target))?;
    make_executable(tmp.as_file()).map_err(io_err("chmod", target))?;
    tmp.as_file().sync_all().map_err(io_err("sync", target))?;
    tmp.persist(target)
        .map_err(|e| io_err("rename into", target)(e.error))?;
    placement.switched = true;
    sync_dir(dir);

    tracing::debug!(
        path = %target.display(),
        size = bytes.len(),
        replaced = placement.replaced_existing(),
        "placed executable"
    );

    Ok(placement)
}

fn backup_existing(target: &Path) -> Result<Option<PathBuf>, PlaceError> {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err("inspect", target)(e)),
    };
    if meta.is_dir() {
        return Err(io_err("replace", target)(io::Error::other("target is a directory")));
    }

    let backup = crate::backup_path_for(target);
    match fs::remove_file(&backup) {
        Ok(()) => tracing::debug!(backup = %backup.display(), "removed leftover backup"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("remove", &backup)(e)),
    }

    if meta.is_file() {
        if fs::hard_link(target, &backup).is_err() {
            fs::copy(target, &backup).map_err(io_err("back up", target))?;
        }
    } else {
        back_up_entry(target, &backup, &meta).map_err(io_err("back up", target))?;
    }
    Ok(Some(backup))
}

/// Keep a non-regular target (a symlink, usually) so a rollback brings back
/// the entry itself rather than what it points to.
#[cfg(unix)]
fn back_up_entry(target: &Path, backup: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.file_type().is_symlink() {
        std::os::unix::fs::symlink(fs::read_link(target)?, backup)
    } else {
        fs::rename(target, backup)
    }
}

#[cfg(not(unix))]
fn back_up_entry(target: &Path, backup: &Path, _: &fs::Metadata) -> io::Result<()> {
    fs::rename(target, backup)
}

#[cfg(unix)]
fn make_executable(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %dir.display(), error = %e, "directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_new_binary() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bin").join("netfetch");

        let placement = place_executable(b"new", &target).unwrap();
        assert!(!placement.replaced_existing());
        placement.commit();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn reinstall_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");

        place_executable(b"same", &target).unwrap().commit();
        place_executable(b"same", &target).unwrap().commit();

        assert_eq!(fs::read(&target).unwrap(), b"same");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["netfetch"]);
    }

    #[test]
    fn rollback_restores_previous_binary() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");
        fs::write(&target, b"old").unwrap();

        let placement = place_executable(b"new", &target).unwrap();
        assert!(placement.replaced_existing());
        assert_eq!(fs::read(&target).unwrap(), b"new");
        placement.rollback().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert!(!crate::backup_path_for(&target).exists());
    }

    #[test]
    fn rollback_of_fresh_install_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");

        place_executable(b"new", &target).unwrap().rollback().unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn dropping_uncommitted_placement_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");
        fs::write(&target, b"old").unwrap();

        drop(place_executable(b"new", &target).unwrap());
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn unswitched_placement_drops_its_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");
        fs::write(&target, b"old").unwrap();

        let placement = Placement {
            target: target.clone(),
            backup: backup_existing(&target).unwrap(),
            switched: false,
            finished: false,
        };
        let backup = crate::backup_path_for(&target);
        assert!(backup.exists());
        drop(placement);

        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert!(!backup.exists());
    }

    #[test]
    fn directory_target_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");
        fs::create_dir(&target).unwrap();

        let err = place_executable(b"new", &target).unwrap_err();
        assert!(matches!(err, PlaceError::Io { action: "replace", .. }));
        assert!(target.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn rollback_restores_symlinked_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-netfetch");
        let target = dir.path().join("netfetch");
        fs::write(&real, b"old").unwrap();
        std::os::unix::fs::symlink(&real, &target).unwrap();

        let placement = place_executable(b"new", &target).unwrap();
        assert!(placement.replaced_existing());
        assert!(!fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
        placement.rollback().unwrap();

        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&target).unwrap(), real);
        assert_eq!(fs::read(&real).unwrap(), b"old");
        assert!(!crate::backup_path_for(&target).exists());
    }

    #[cfg(unix)]
    #[test]
    fn commit_over_symlink_leaves_link_destination_alone() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-netfetch");
        let target = dir.path().join("netfetch");
        fs::write(&real, b"old").unwrap();
        std::os::unix::fs::symlink(&real, &target).unwrap();

        place_executable(b"new", &target).unwrap().commit();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read(&real).unwrap(), b"old");
        assert!(fs::symlink_metadata(crate::backup_path_for(&target)).is_err());
    }

    #[test]
    fn commit_discards_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("netfetch");
        fs::write(&target, b"old").unwrap();

        place_executable(b"new", &target).unwrap().commit();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!crate::backup_path_for(&target).exists());
    }
}
