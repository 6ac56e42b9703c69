//! Install command

use anyhow::Result;
use crossterm::style::Stylize;
use tap_core::{InstallRequest, Reporter, VersionRequest};
use tokio_util::sync::CancellationToken;

use crate::cmd::Context;
use crate::ui::ConsoleReporter;

/// Resolve, fetch, verify, extract, install and smoke-test one release.
pub async fn install(ctx: &Context, version: &VersionRequest, smoke_test: bool) -> Result<()> {
    let reporter = ConsoleReporter::new(ctx.quiet);
    let mut request = InstallRequest::new(version.clone(), ctx.platform);
    if smoke_test && !ctx.targets_host() {
        reporter.warning(&format!(
            "{} binaries cannot run on this host; skipping smoke test",
            ctx.platform
        ));
    }
    if !smoke_test || !ctx.targets_host() {
        request = request.without_smoke_test();
    }

    let cancel = CancellationToken::new();
    let installer = ctx.installer(reporter)?.with_cancellation(cancel.clone());

    if ctx.dry_run {
        let resolved = installer.plan(request)?;
        println!(
            "{} would install {} {} to {}",
            "dry-run:".yellow().bold(),
            resolved.version(),
            resolved.platform(),
            installer.target_path(resolved.platform()).display()
        );
        println!("  {}", resolved.descriptor.url.as_str().dark_grey());
        return Ok(());
    }

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling install");
            cancel.cancel();
        }
    });

    let result = installer.install(request).await;
    watcher.abort();

    let report = result?;
    if let Some(line) = &report.smoke_output {
        reporter.info(&format!("  {}", line.as_str().dark_grey()));
    } else if report.smoke_skipped {
        reporter.warning("installed without a smoke test");
    }
    Ok(())
}
