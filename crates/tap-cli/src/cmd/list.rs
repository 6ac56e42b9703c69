//! List command

use anyhow::Result;
use crossterm::style::Stylize;
use tap_core::{VersionRequest, resolve};

use crate::cmd::Context;

/// List every published version with its platforms, newest first.
pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let catalog = &ctx.catalog;

    if json {
        let descriptors: Vec<_> = catalog.descriptors().collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let latest = resolve(catalog, &VersionRequest::Latest, ctx.platform)
        .ok()
        .map(|d| d.version.clone());

    for version in catalog.versions().into_iter().rev() {
        let platforms = catalog
            .platforms_for(version)
            .iter()
            .map(|p| {
                if *p == ctx.platform {
                    p.to_string().green().to_string()
                } else {
                    p.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let marker = if latest.as_ref() == Some(version) {
            "latest".cyan().to_string()
        } else {
            String::new()
        };
        println!("  {:<10}{platforms} {marker}", version.as_str());
    }
    Ok(())
}
