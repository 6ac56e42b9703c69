//! Info command

use anyhow::Result;
use crossterm::style::Stylize;
use tap_core::{VersionRequest, resolve};

use crate::cmd::Context;

/// Show formula metadata and what `install` would do on this platform.
pub fn info(ctx: &Context) -> Result<()> {
    let catalog = &ctx.catalog;
    let latest = resolve(catalog, &VersionRequest::Latest, ctx.platform).ok();
    let lw = 12;

    println!();
    println!(
        "  {} {}",
        catalog.name().white().bold(),
        latest.map_or("-", |d| d.version.as_str()).dark_grey()
    );
    if !catalog.description().is_empty() {
        println!("  {}", catalog.description());
    }
    println!();
    println!("  {:<lw$}{}", "homepage", catalog.homepage());
    println!("  {:<lw$}{}", "binary", catalog.binary_name());
    println!(
        "  {:<lw$}{}",
        "smoke test",
        catalog.smoke_test_args().join(" ")
    );
    println!("  {:<lw$}{}", "revisions", catalog.revision_count());
    println!("  {:<lw$}{}", "platform", ctx.platform);
    println!("  {:<lw$}{}", "bin dir", ctx.config.bin_dir().display());
    Ok(())
}
