//! tap - verified installer for the netfetch release formula
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Resolves a requested netfetch release against the embedded formula
//! history, downloads it, checks its SHA-256, extracts the executable and
//! installs it atomically, then runs a smoke test.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.tap/
//! ├── bin/          # Installed executables
//! ├── formula/      # Extra formula revisions (*.toml), applied after the embedded ones
//! └── config.toml   # Optional settings
//! ```

pub mod cmd;
pub mod ui;

pub use tap_core::paths::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tap_core::{Arch, Os, VersionRequest};

#[derive(Debug, Parser)]
#[command(name = "tap")]
#[command(author, version, about = "tap - verified installer for netfetch releases")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Install directory (default: ~/.tap/bin)
    #[arg(long, global = true, env = "TAP_BIN_DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Directory of extra formula revisions (default: ~/.tap/formula)
    #[arg(long, global = true, env = "TAP_FORMULA_DIR")]
    pub formula_dir: Option<PathBuf>,

    /// Target operating system (default: host)
    #[arg(long, global = true)]
    pub os: Option<Os>,

    /// Target architecture (default: host)
    #[arg(long, global = true)]
    pub arch: Option<Arch>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download, verify and install a release
    Install {
        /// Version to install, or `latest`
        #[arg(default_value = "latest")]
        version: VersionRequest,

        /// Skip running the installed binary afterwards
        #[arg(long)]
        no_smoke_test: bool,
    },
    /// Show which artifact a version resolves to, without downloading it
    Resolve {
        /// Version to resolve, or `latest`
        #[arg(default_value = "latest")]
        version: VersionRequest,

        /// Print the descriptor as JSON
        #[arg(long)]
        json: bool,
    },
    /// List published versions and their platforms
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show formula metadata
    Info,
    /// Re-run the smoke test against the installed binary
    Verify {
        /// Use the smoke-test arguments of this release (default: latest formula)
        version: Option<VersionRequest>,
    },
    /// Compute SHA256 hash of a file (for formula authoring)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate a formula revision file
    Check {
        /// Formula file to check
        path: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_defaults_to_latest() {
        let cli = Cli::parse_from(["tap", "install"]);
        match cli.command {
            Commands::Install {
                version,
                no_smoke_test,
            } => {
                assert_eq!(version, VersionRequest::Latest);
                assert!(!no_smoke_test);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn platform_flags_accept_aliases() {
        let cli = Cli::parse_from(["tap", "resolve", "v5.2.5", "--os", "macos", "--arch", "x86_64"]);
        assert_eq!(cli.os, Some(Os::Darwin));
        assert_eq!(cli.arch, Some(Arch::Amd64));
        match cli.command {
            Commands::Resolve { version, .. } => {
                assert_eq!(version, VersionRequest::Exact("5.2.5".into()));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
