//! Patch command - verify, rewrite and re-checksum an image

use anyhow::{Context, Result};
use rackflash_core::{patcher, Variant};
use std::path::Path;

use super::resolve_profile;
use crate::output::OutputContext;

/// Patch `input` for `variant` and write the result to `output`
pub fn patch(
    variant: Variant,
    input: &Path,
    output: &Path,
    table: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let profile = resolve_profile(variant, table)?;

    ctx.info(&format!(
        "Patching {} for variant {} ({})...",
        input.display(),
        variant,
        variant.part_number()
    ));

    let report = patcher::patch_file(input, output, &profile)
        .with_context(|| format!("Failed to patch {}", input.display()))?;

    ctx.print_kv(&[
        ("Variant", variant.to_string()),
        ("Output", output.display().to_string()),
        ("Patches applied", report.ops_applied.to_string()),
        ("Patches verified", report.ops_verified.to_string()),
        ("Checksums updated", report.regions_updated.to_string()),
        ("Bytes changed", report.bytes_changed.to_string()),
    ]);
    ctx.success("\nImage patched successfully");

    Ok(())
}
