//! Resolve command

use anyhow::Result;
use crossterm::style::Stylize;
use tap_core::{InstallRequest, NullReporter, VersionRequest};

use crate::cmd::Context;

/// Print the descriptor `version` resolves to on the target platform.
pub fn resolve(ctx: &Context, version: &VersionRequest, json: bool) -> Result<()> {
    let installer = ctx.installer(NullReporter)?;
    let resolved = installer.plan(InstallRequest::new(version.clone(), ctx.platform))?;
    let d = &resolved.descriptor;

    if json {
        println!("{}", serde_json::to_string_pretty(d)?);
        return Ok(());
    }

    let lw = 10;
    println!(
        "  {} {} {}",
        ctx.catalog.name().white().bold(),
        d.version.as_str(),
        d.platform.to_string().dark_grey()
    );
    println!("  {:<lw$}{}", "url", d.url);
    println!("  {:<lw$}{}", "sha256", d.content_hash);
    println!("  {:<lw$}{}", "format", d.format());
    println!(
        "  {:<lw$}{} {}",
        "smoke",
        resolved.binary_name,
        resolved.smoke_test_args.join(" ")
    );
    println!(
        "  {:<lw$}{}",
        "target",
        installer.target_path(d.platform).display()
    );
    Ok(())
}
