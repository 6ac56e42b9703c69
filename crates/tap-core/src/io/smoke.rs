//! Post-install smoke test: run the installed binary and require a clean exit.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// `ETXTBSY`: another process still holds a write handle to the binary.
const TEXT_FILE_BUSY: i32 = 26;
const SPAWN_ATTEMPTS: u32 = 5;

#[derive(Error, Debug)]
pub enum SmokeError {
    #[error("Failed to run {}: {source}", .path.display())]
    Spawn { path: PathBuf, source: io::Error },

    #[error("Did not exit within {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("Exited with {status}{}", stderr_suffix(.stderr))]
    Failed { status: ExitStatus, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let line = stderr.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        String::new()
    } else {
        format!(": {line}")
    }
}

/// What a passing smoke test printed.
#[derive(Debug, Clone)]
pub struct SmokeOutput {
    pub status: ExitStatus,
    pub stdout: String,
}

impl SmokeOutput {
    /// First non-empty stdout line, typically the version banner.
    pub fn first_line(&self) -> &str {
        self.stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// Run `binary args...` and wait at most `timeout` for a zero exit.
///
/// Blocks the calling thread; async callers should use `spawn_blocking`.
///
/// # Errors
///
/// A spawn failure, a timeout (the child is killed), or a non-zero exit or
/// signal.
pub fn run_smoke_test(
    binary: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<SmokeOutput, SmokeError> {
    let mut stdout = tempfile::tempfile()?;
    let mut stderr = tempfile::tempfile()?;

    tracing::debug!(binary = %binary.display(), ?args, "running smoke test");
    let mut child = spawn(binary, args, &stdout, &stderr)?;

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            child.kill()?;
            child.wait()?;
            return Err(SmokeError::Timeout { timeout });
        }
    };

    let stdout = read_all(&mut stdout)?;
    if !status.success() {
        return Err(SmokeError::Failed {
            status,
            stderr: read_all(&mut stderr)?,
        });
    }

    Ok(SmokeOutput { status, stdout })
}

fn spawn(
    binary: &Path,
    args: &[String],
    stdout: &File,
    stderr: &File,
) -> Result<std::process::Child, SmokeError> {
    let mut attempt = 1;
    loop {
        let result = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?)
            .spawn();

        match result {
            Ok(child) => return Ok(child),
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt < SPAWN_ATTEMPTS => {
                tracing::debug!(attempt, "binary busy, retrying spawn");
                std::thread::sleep(Duration::from_millis(20 * u64::from(attempt)));
                attempt += 1;
            }
            Err(source) => {
                return Err(SmokeError::Spawn {
                    path: binary.to_path_buf(),
                    source,
                });
            }
        }
    }
}

fn read_all(file: &mut File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
