//! Variants command - list built-in firmware variants

use anyhow::Result;
use rackflash_core::Registry;

use crate::output::{OutputContext, VariantRow};

/// List all built-in variants
pub fn variants(ctx: &OutputContext) -> Result<()> {
    let rows: Vec<VariantRow> = Registry::builtin()
        .profiles()
        .map(|p| VariantRow {
            variant: p.variant.to_string(),
            part_number: p.variant.part_number().to_string(),
            image_len: format!("0x{:X}", p.image_len),
            patches: p.patch_table.ops.len(),
            regions: p.patch_table.regions.len(),
            segments: p.flash_segments.len(),
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
