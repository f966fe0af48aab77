//! Command implementations for rackflash

pub mod flash;
pub mod keygen;
pub mod patch;
pub mod variants;
pub mod verify;

pub use flash::flash;
pub use keygen::keygen;
pub use patch::patch;
pub use variants::variants;
pub use verify::verify;

use std::path::Path;

use anyhow::{Context, Result};
use rackflash_core::{table_file, Registry, Variant, VariantProfile};

/// Built-in profile for `variant`, with its patch table replaced by `table`
/// when one is given
pub(crate) fn resolve_profile(variant: Variant, table: Option<&Path>) -> Result<VariantProfile> {
    let profile = Registry::builtin().get(variant).clone();
    let Some(path) = table else {
        return Ok(profile);
    };

    let table = table_file::load(path)
        .with_context(|| format!("Failed to load patch table: {}", path.display()))?;
    let profile = profile.with_patch_table(table);
    profile
        .validate()
        .with_context(|| format!("Patch table does not fit variant {}", variant))?;
    Ok(profile)
}
