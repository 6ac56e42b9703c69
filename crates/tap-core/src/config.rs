//! User settings, read from `~/.tap/config.toml`.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. Command-line flags override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::download::FetchOptions;
use crate::io::install::InstallOptions;

/// Errors raised while reading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Installer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the binary is installed into. `None` means `~/.tap/bin`.
    pub bin_dir: Option<PathBuf>,
    /// Extra directory of formula revisions layered over the embedded set.
    pub formula_dir: Option<PathBuf>,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Download attempts after the first one fails transiently.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub retry_base_delay_ms: u64,
    /// Upper bound on the post-install smoke test.
    pub smoke_test_timeout_secs: u64,
    /// How long to wait for another install holding the target lock.
    pub lock_timeout_secs: u64,
    /// Age after which a leftover lock file is considered abandoned.
    pub stale_lock_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_dir: None,
            formula_dir: None,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            smoke_test_timeout_secs: 30,
            lock_timeout_secs: 60,
            stale_lock_secs: 600,
        }
    }
}

impl Config {
    /// Load `~/.tap/config.toml`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = crate::config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse settings from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if the TOML is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Effective install directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.bin_dir.clone().unwrap_or_else(crate::bin_path)
    }

    /// Effective formula overlay directory.
    pub fn formula_dir(&self) -> PathBuf {
        self.formula_dir.clone().unwrap_or_else(crate::formula_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn smoke_test_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_test_timeout_secs)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            lock_timeout: Duration::from_secs(self.lock_timeout_secs),
            stale_lock_after: Duration::from_secs(self.stale_lock_secs),
        }
    }

    /// HTTP client honouring the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(self.request_timeout())
            .build()
    }
}
