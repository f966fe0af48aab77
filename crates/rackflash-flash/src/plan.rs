//! What a flash run is going to do, checked before anything is sent

use rackflash_core::{checksum, FirmwareImage, FlashSegment, Variant, VariantProfile};

use crate::error::{FlashError, FlashResult};

/// A validated flash run: which segments of which image go to which bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    pub variant: Variant,
    pub bus: u8,
    /// In programming order
    pub segments: Vec<FlashSegment>,
    /// Sum of all segment lengths
    pub total_bytes: usize,
}

impl FlashPlan {
    /// Build the plan for flashing `image` as `profile` on `bus`.
    ///
    /// Fails if the variant has no flash layout, the image has the wrong size,
    /// any checksum region of the image does not verify, or any segment is
    /// malformed, outside the image or overlaps another.
    pub fn new(profile: &VariantProfile, image: &FirmwareImage, bus: u8) -> FlashResult<Self> {
        if profile.flash_segments.is_empty() {
            return Err(FlashError::Config(format!(
                "No flash layout known for variant {}",
                profile.variant
            )));
        }

        image.expect_len(profile.image_len)?;

        // The unit refuses to boot an image whose checksums disagree
        profile.patch_table.validate(image.len())?;
        if let Some(mismatch) = checksum::first_mismatch(image.as_bytes(), &profile.patch_table.regions) {
            return Err(FlashError::Checksum {
                region: mismatch.region,
                stored: mismatch.stored,
                computed: mismatch.computed,
            });
        }

        for segment in &profile.flash_segments {
            segment.validate(image.len())?;
        }

        for (i, a) in profile.flash_segments.iter().enumerate() {
            for b in &profile.flash_segments[i + 1..] {
                if a.start <= b.end && b.start <= a.end {
                    return Err(FlashError::Config(format!(
                        "Flash segments {} and {} overlap",
                        a, b
                    )));
                }
            }
        }

        Ok(Self {
            variant: profile.variant,
            bus,
            segments: profile.flash_segments.clone(),
            total_bytes: profile.flash_segments.iter().map(FlashSegment::len).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackflash_core::{ChecksumRegion, Registry};

    /// Full-size image with every checksum region consistent
    fn consistent_image(profile: &VariantProfile) -> FirmwareImage {
        let bytes: Vec<u8> = (0..profile.image_len).map(|i| (i * 7 % 253) as u8).collect();
        FirmwareImage::from_bytes(checksum::update(&bytes, &profile.patch_table.regions))
    }

    #[test]
    fn sw3501_plan() {
        let profile = Registry::builtin().get(Variant::Sw3501);
        let image = consistent_image(profile);

        let plan = FlashPlan::new(profile, &image, 1).unwrap();
        assert_eq!(plan.segments.len(), 6);
        assert_eq!(plan.segments[0], FlashSegment::new(676, 705));
        assert_eq!(plan.total_bytes, 30 + 48 + 16 + 23 + 30 + 0x56000);
    }

    #[test]
    fn sw2501_unsupported() {
        let profile = Registry::builtin().get(Variant::Sw2501);
        let image = FirmwareImage::from_bytes(vec![0; profile.image_len]);
        assert!(matches!(
            FlashPlan::new(profile, &image, 1),
            Err(FlashError::Config(_))
        ));
    }

    #[test]
    fn rejects_wrong_image_size() {
        let profile = Registry::builtin().get(Variant::Sw3501);
        let image = FirmwareImage::from_bytes(vec![0; 0x100]);
        assert!(matches!(
            FlashPlan::new(profile, &image, 1),
            Err(FlashError::Image(_))
        ));
    }

    #[test]
    fn rejects_image_with_bad_checksum() {
        let profile = Registry::builtin().get(Variant::Sw3501);
        let first = profile.patch_table.regions[0];
        let mut bytes = consistent_image(profile).into_bytes();
        bytes[first.range_start] ^= 0x01;
        let image = FirmwareImage::from_bytes(bytes.clone());

        let err = FlashPlan::new(profile, &image, 1).unwrap_err();

        let stored = u16::from_be_bytes([
            bytes[first.checksum_offset],
            bytes[first.checksum_offset + 1],
        ]);
        let computed = u16::from_be_bytes(checksum::crc16(&bytes[first.range()]));
        match err {
            FlashError::Checksum {
                region,
                stored: s,
                computed: c,
            } => {
                assert_eq!(region, first);
                assert_eq!(s, stored);
                assert_eq!(c, computed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unchecked_pattern_image() {
        let profile = Registry::builtin().get(Variant::Sw3501);
        let image = FirmwareImage::from_bytes(
            (0..profile.image_len).map(|i| (i * 7 % 253) as u8).collect(),
        );
        let err = FlashPlan::new(profile, &image, 1).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn rejects_overlap() {
        let mut profile = Registry::builtin().get(Variant::Sw3501).clone();
        profile.flash_segments = vec![FlashSegment::new(0, 0x20), FlashSegment::new(0x20, 0x40)];
        profile.patch_table.regions = vec![ChecksumRegion::new(0x100, 0x102, 0x200)];
        let image = FirmwareImage::from_bytes(vec![0; profile.image_len]);
        assert!(matches!(
            FlashPlan::new(&profile, &image, 1),
            Err(FlashError::Config(_))
        ));
    }
}
