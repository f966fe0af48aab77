//! Registry of supported firmware variants
//!
//! Every variant is a closed enum member mapping to one immutable
//! [`VariantProfile`]. The built-in registry is constructed once on first
//! use and never mutated afterwards.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, PatchResult};
use crate::patch::PatchTable;
use crate::segment::FlashSegment;
use crate::tables;

/// Supported rack firmware variants (by stock software version)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    /// Part 1K0909144E, software 2501
    #[serde(rename = "2501")]
    Sw2501,
    /// Part 1K0909144R, software 3501
    #[serde(rename = "3501")]
    Sw3501,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Sw2501, Variant::Sw3501];

    /// Software version string as printed on the unit
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Sw2501 => "2501",
            Variant::Sw3501 => "3501",
        }
    }

    /// Hardware part number the variant ships on
    pub fn part_number(&self) -> &'static str {
        match self {
            Variant::Sw2501 => "1K0909144E",
            Variant::Sw3501 => "1K0909144R",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2501" => Ok(Variant::Sw2501),
            "3501" => Ok(Variant::Sw3501),
            other => Err(PatchError::Config(format!(
                "Unknown firmware variant '{}'. Valid variants: 2501, 3501",
                other
            ))),
        }
    }
}

/// Everything known about one firmware variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantProfile {
    pub variant: Variant,
    /// Exact size of a full memory dump
    pub image_len: usize,
    pub patch_table: PatchTable,
    /// Flash segments in programming order (empty if flashing is unsupported)
    pub flash_segments: Vec<FlashSegment>,
}

impl VariantProfile {
    /// Replace the patch table (e.g. with one loaded from a file)
    pub fn with_patch_table(mut self, table: PatchTable) -> Self {
        self.patch_table = table;
        self
    }

    /// Check the profile is internally consistent
    pub fn validate(&self) -> PatchResult<()> {
        self.patch_table.validate(self.image_len)?;
        for segment in &self.flash_segments {
            segment.validate(self.image_len)?;
        }
        Ok(())
    }
}

/// Variant-keyed profiles
#[derive(Debug)]
pub struct Registry {
    sw2501: VariantProfile,
    sw3501: VariantProfile,
}

impl Registry {
    /// The built-in registry
    pub fn builtin() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(|| Registry {
            sw2501: tables::sw2501(),
            sw3501: tables::sw3501(),
        })
    }

    /// Profile for `variant`
    pub fn get(&self, variant: Variant) -> &VariantProfile {
        match variant {
            Variant::Sw2501 => &self.sw2501,
            Variant::Sw3501 => &self.sw3501,
        }
    }

    /// All profiles in [`Variant::ALL`] order
    pub fn profiles(&self) -> impl Iterator<Item = &VariantProfile> {
        Variant::ALL.into_iter().map(|v| self.get(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn registry_covers_all_variants() {
        let registry = Registry::builtin();
        for variant in Variant::ALL {
            assert_eq!(registry.get(variant).variant, variant);
        }
        assert_eq!(registry.profiles().count(), Variant::ALL.len());
    }

    #[rstest]
    #[case(Variant::Sw2501)]
    #[case(Variant::Sw3501)]
    fn builtin_profiles_are_consistent(#[case] variant: Variant) {
        let profile = Registry::builtin().get(variant);
        profile.validate().unwrap();
        assert_eq!(profile.image_len, 0x60000);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("3501".parse::<Variant>().unwrap(), Variant::Sw3501);
        assert_eq!(Variant::Sw2501.to_string(), "2501");
        assert!("9999".parse::<Variant>().is_err());
    }
}
