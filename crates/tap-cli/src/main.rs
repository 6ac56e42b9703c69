//! tap - verified installer CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tap_cli::cmd::{self, Context};
use tap_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that need neither settings nor the catalog.
    match &cli.command {
        Commands::Hash { files } => return cmd::hash::hash(files),
        Commands::Completions { shell } => {
            cmd::completions::completions(*shell);
            return Ok(());
        }
        _ => {}
    }

    let ctx = Context::load(&cli)?;
    match &cli.command {
        Commands::Install {
            version,
            no_smoke_test,
        } => cmd::install::install(&ctx, version, !no_smoke_test).await,
        Commands::Resolve { version, json } => cmd::resolve::resolve(&ctx, version, *json),
        Commands::List { json } => cmd::list::list(&ctx, *json),
        Commands::Info => cmd::info::info(&ctx),
        Commands::Verify { version } => cmd::verify::verify(&ctx, version.as_ref()).await,
        Commands::Check { path } => cmd::check::check(&ctx, path),
        Commands::Hash { .. } | Commands::Completions { .. } => Ok(()),
    }
}
