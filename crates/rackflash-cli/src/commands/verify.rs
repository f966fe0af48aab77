//! Verify command - check every checksum region of an image

use anyhow::{Context, Result};
use rackflash_core::{FirmwareImage, Patcher, Variant};
use std::path::Path;

use super::resolve_profile;
use crate::output::OutputContext;

/// Check the checksum regions of `input` against `variant`'s table
pub fn verify(
    variant: Variant,
    input: &Path,
    table: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let profile = resolve_profile(variant, table)?;
    let image = FirmwareImage::read(input)
        .with_context(|| format!("Failed to read image: {}", input.display()))?;

    Patcher::for_profile(&profile)
        .verify(&image)
        .with_context(|| format!("{} failed verification", input.display()))?;

    ctx.print_kv(&[
        ("Image", input.display().to_string()),
        ("Variant", variant.to_string()),
        ("Regions checked", profile.patch_table.regions.len().to_string()),
        ("Result", "ok".to_string()),
    ]);
    Ok(())
}
