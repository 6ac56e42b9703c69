//! Verify command

use anyhow::{Context as _, Result, bail};
use crossterm::style::Stylize;
use tap_core::io::smoke::run_smoke_test;
use tap_core::{NullReporter, VersionRequest, resolve};

use crate::cmd::Context;

/// Run the smoke test against the binary currently installed.
pub async fn verify(ctx: &Context, version: Option<&VersionRequest>) -> Result<()> {
    let installer = ctx.installer(NullReporter)?;
    let target = installer.target_path(ctx.platform);
    if !target.exists() {
        bail!("{} is not installed at {}", ctx.catalog.name(), target.display());
    }

    let args = match version {
        Some(request) => {
            let d = resolve(&ctx.catalog, request, ctx.platform)?;
            ctx.catalog.smoke_test_args_for(&d.version).to_vec()
        }
        None => ctx.catalog.smoke_test_args().to_vec(),
    };
    let timeout = ctx.config.smoke_test_timeout();

    let binary = target.clone();
    let output = tokio::task::spawn_blocking(move || run_smoke_test(&binary, &args, timeout))
        .await
        .context("Smoke test task panicked")?
        .with_context(|| format!("Smoke test of {} failed", target.display()))?;

    println!(
        "{} {} {}",
        "✓".green().bold(),
        target.display(),
        output.first_line().dark_grey()
    );
    Ok(())
}
