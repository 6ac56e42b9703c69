pub mod check;
pub mod completions;
pub mod hash;
pub mod info;
pub mod install;
pub mod list;
pub mod resolve;
pub mod verify;

use anyhow::{Context as _, Result, bail};
use tap_core::{Catalog, Config, Installer, Platform, Reporter};

use crate::Cli;

/// Settings, catalog and target platform shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub catalog: Catalog,
    pub platform: Platform,
    pub host: Option<Platform>,
    pub dry_run: bool,
    pub quiet: bool,
}

impl Context {
    /// Load `config.toml`, apply command-line overrides and build the catalog.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = Config::load().context("Failed to load config.toml")?;
        if let Some(dir) = &cli.bin_dir {
            config.bin_dir = Some(dir.clone());
        }
        if let Some(dir) = &cli.formula_dir {
            config.formula_dir = Some(dir.clone());
        }
        if let Some(secs) = cli.timeout {
            config.request_timeout_secs = secs;
        }

        let formula_dir = config.formula_dir();
        let catalog = Catalog::load(&formula_dir)
            .with_context(|| format!("Failed to load formulas from {}", formula_dir.display()))?;

        let host = Platform::current().ok();
        let platform = match (cli.os, cli.arch, host) {
            (Some(os), Some(arch), _) => Platform::new(os, arch),
            (os, arch, Some(host)) => {
                Platform::new(os.unwrap_or(host.os), arch.unwrap_or(host.arch))
            }
            (_, _, None) => bail!(
                "Unsupported host {}/{}; pass --os and --arch",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        };
        tracing::debug!(%platform, ?host, revisions = catalog.revision_count(), "context loaded");

        Ok(Self {
            config,
            catalog,
            platform,
            host,
            dry_run: cli.dry_run,
            quiet: cli.quiet,
        })
    }

    /// Whether binaries for the target platform can run here.
    pub fn targets_host(&self) -> bool {
        self.host == Some(self.platform)
    }

    pub fn installer<R: Reporter>(&self, reporter: R) -> Result<Installer<R>> {
        Installer::new(self.catalog.clone(), self.config.clone(), reporter)
            .context("Failed to build HTTP client")
    }
}
