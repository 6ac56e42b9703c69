//! Check command

use anyhow::{Context as _, Result};
use crossterm::style::Stylize;
use std::path::Path;
use tap_core::formula;

use crate::cmd::Context;

/// Validate a formula revision and make sure it applies on top of the catalog.
pub fn check(ctx: &Context, path: &Path) -> Result<()> {
    let revision = formula::from_file(path)?;

    let mut catalog = ctx.catalog.clone();
    catalog
        .apply(revision.clone())
        .with_context(|| format!("{} does not apply to the current formula", path.display()))?;

    for d in revision.descriptors() {
        let suffix = d.platform.asset_suffix();
        if !d.file_name().contains(&suffix) {
            eprintln!(
                "{} {} does not mention {suffix}",
                "warning:".yellow().bold(),
                d.file_name()
            );
        }
    }

    let superseded = revision
        .descriptors()
        .filter(|d| ctx.catalog.get(&d.version, d.platform).is_some())
        .count();

    println!(
        "{} {}: {} {} ({} platform(s), {} superseding)",
        "✓".green().bold(),
        path.display(),
        revision.name,
        revision.version,
        revision.platforms.len(),
        superseded
    );
    Ok(())
}
