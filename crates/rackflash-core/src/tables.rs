//! Built-in patch tables and flash layouts
//!
//! Literal configuration data for the supported variants. Patch ops disable
//! the low-speed lockout (disengage countdown and minimum speed), bump the
//! software version, clear the end-of-firmware marker so the bootloader
//! accepts the image, and for 3501 swap in softer/sportier steering maps.

use crate::patch::{ChecksumRegion, PatchOp, PatchTable};
use crate::segment::FlashSegment;
use crate::variant::{Variant, VariantProfile};

/// Size of a full rack memory dump
pub(crate) const IMAGE_LEN: usize = 0x60000;

/// First byte of the application software area on 3501
const SW3501_ASW_START: usize = 0x0A000;
/// End (exclusive) of the application software area on 3501
const SW3501_ASW_END: usize = 0x5C000;
/// Span of one application block CRC
const SW3501_ASW_BLOCK: usize = 0x0FFF;
/// Where the application block CRCs are stored (two bytes each)
const SW3501_ASW_CRC_TABLE: usize = 0x5FEF8;

pub(crate) fn sw2501() -> VariantProfile {
    let ops = vec![
        PatchOp::replace(
            0x05E7A8,
            b"1K0909144E \x002501",
            b"1K0909144E \x002502",
        )
        .with_label("Software number and version"),
        PatchOp::replace(0x05E221, b"\x64", b"\x00").with_label("Disengage countdown"),
        PatchOp::replace(0x05E283, b"\x32", b"\x00").with_label("Minimum speed"),
        PatchOp::replace(
            0x05FFFC,
            b"Ende",
            b"\xFF\xFF\xFF\xFF",
        )
        .with_label("End of firmware marker"),
    ];

    let regions = vec![ChecksumRegion::new(0x05EFFC, 0x5E000, 0x5EFFC)];

    VariantProfile {
        variant: Variant::Sw2501,
        image_len: IMAGE_LEN,
        patch_table: PatchTable::new(ops, regions),
        // No verified flash layout for this variant
        flash_segments: Vec::new(),
    }
}

pub(crate) fn sw3501() -> VariantProfile {
    let ops = vec![
        PatchOp::replace(
            0x05D828,
            b"1K0909144R \x003501",
            b"1K0909144R \x003502",
        )
        .with_label("Software number and version"),
        PatchOp::replace(0x05D289, b"\x64", b"\x00").with_label("Disengage countdown"),
        PatchOp::replace(0x05D2FA, b"\x14", b"\x00").with_label("Minimum speed"),
        PatchOp::replace(
            0x05E200,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x43, 0x01, 0x50, 0x01, 0x00, 0x00, 0x16, 0x00, 0x30, 0x01,
                0xD6, 0x02, 0xF4, 0x05, 0x69, 0x0C, 0xD2, 0x10, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x07, 0x00, 0x1F, 0x00, 0xC3, 0x00, 0xD8, 0x00,
                0xF2, 0x00, 0x0D, 0x01, 0x21, 0x01, 0x00, 0x00, 0x58, 0x00, 0xE4, 0x01,
                0x00, 0x0E, 0x77, 0x0F, 0xAB, 0x10, 0x5E, 0x11, 0x7C, 0x11, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 1/1"),
        PatchOp::replace(
            0x05E224,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x43, 0x01, 0x6C, 0x01, 0x00, 0x00, 0x12, 0x00, 0xF3, 0x00,
                0x45, 0x02, 0xC3, 0x04, 0xEE, 0x09, 0x75, 0x0D, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x4D, 0x00, 0x88, 0x00, 0xBE, 0x00,
                0x10, 0x01, 0x59, 0x01, 0xA1, 0x01, 0x00, 0x00, 0x7D, 0x00, 0x33, 0x03,
                0xB3, 0x05, 0x00, 0x08, 0xBC, 0x0B, 0xA2, 0x0F, 0x00, 0x14, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 1/2"),
        PatchOp::replace(
            0x05E26C,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0x9F, 0x01, 0x00, 0x00, 0x0F, 0x00, 0xE7, 0x00,
                0x24, 0x02, 0x44, 0x04, 0x19, 0x09, 0x70, 0x11, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x07, 0x00, 0x1F, 0x00, 0x3E, 0x00, 0x65, 0x00,
                0x9B, 0x00, 0xE9, 0x00, 0x33, 0x01, 0x00, 0x00, 0x14, 0x00, 0xAB, 0x00,
                0xA4, 0x01, 0x5C, 0x03, 0x00, 0x07, 0x1C, 0x0D, 0x9A, 0x11, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 2/1"),
        PatchOp::replace(
            0x05E290,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0xBE, 0x01, 0x00, 0x00, 0x0C, 0x00, 0xB9, 0x00,
                0xB6, 0x01, 0x6A, 0x03, 0x47, 0x07, 0xF3, 0x0D, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x4D, 0x00, 0x88, 0x00, 0xBE, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x1C, 0x02, 0x00, 0x00, 0x31, 0x00, 0x0B, 0x01,
                0x1F, 0x02, 0x4C, 0x03, 0xA0, 0x05, 0x33, 0x0B, 0x62, 0x12, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 2/2"),
        PatchOp::replace(
            0x05E2D8,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0xEF, 0x01, 0x00, 0x00, 0x07, 0x00, 0x9A, 0x00,
                0x76, 0x01, 0xD3, 0x02, 0xF6, 0x05, 0xA4, 0x0C, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x07, 0x00, 0x1F, 0x00, 0x3E, 0x00, 0x65, 0x00,
                0x9B, 0x00, 0xE9, 0x00, 0x37, 0x01, 0x00, 0x00, 0x08, 0x00, 0x62, 0x00,
                0x22, 0x01, 0x7C, 0x02, 0x3A, 0x05, 0xE6, 0x0A, 0x99, 0x11, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 3/1"),
        PatchOp::replace(
            0x05E2FC,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0xFE, 0x01, 0x00, 0x00, 0x06, 0x00, 0x7B, 0x00,
                0x2B, 0x01, 0x42, 0x02, 0xC5, 0x04, 0x1D, 0x0A, 0x00, 0x12, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x4D, 0x00, 0x89, 0x00, 0xBE, 0x00,
                0x10, 0x01, 0x97, 0x01, 0x20, 0x02, 0x00, 0x00, 0x0E, 0x00, 0x65, 0x00,
                0xEA, 0x00, 0x97, 0x01, 0x54, 0x03, 0x41, 0x07, 0x2F, 0x0F, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 3/2"),
        PatchOp::replace(
            0x05E344,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x03, 0x00, 0x5C, 0x00,
                0xF1, 0x00, 0xC6, 0x01, 0x9F, 0x03, 0x38, 0x08, 0xD7, 0x0E, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x07, 0x00, 0x1F, 0x00, 0x3E, 0x00, 0x65, 0x00,
                0x9C, 0x00, 0xE9, 0x00, 0x37, 0x01, 0x00, 0x00, 0x03, 0x00, 0x3D, 0x00,
                0xC1, 0x00, 0xB8, 0x01, 0xE0, 0x03, 0x27, 0x08, 0x9E, 0x0E, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 4/1"),
        PatchOp::replace(
            0x05E368,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x02, 0x00, 0x4A, 0x00,
                0xC1, 0x00, 0x6B, 0x01, 0xE6, 0x02, 0x93, 0x06, 0xD7, 0x0E, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x4D, 0x00, 0x88, 0x00, 0xBF, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x05, 0x00, 0x3E, 0x00,
                0x78, 0x00, 0xE2, 0x00, 0xEC, 0x01, 0xA8, 0x04, 0x71, 0x0D, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 4/2"),
        PatchOp::replace(
            0x05E3B0,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x01, 0x00, 0x25, 0x00,
                0x5C, 0x00, 0xDD, 0x00, 0x33, 0x02, 0x69, 0x05, 0x8A, 0x0A, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x07, 0x00, 0x1F, 0x00, 0x3E, 0x00, 0x65, 0x00,
                0x9C, 0x00, 0xE9, 0x00, 0x37, 0x01, 0x00, 0x00, 0x02, 0x00, 0x1B, 0x00,
                0x6E, 0x00, 0x15, 0x01, 0x90, 0x02, 0xAA, 0x05, 0xD1, 0x0A, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 5/1"),
        PatchOp::replace(
            0x05E3D4,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x37, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x11, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x01, 0x00, 0x1E, 0x00,
                0x4A, 0x00, 0xB1, 0x00, 0xC2, 0x01, 0x54, 0x04, 0x8A, 0x0A, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x4D, 0x00, 0x88, 0x00, 0xBE, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x06, 0x00, 0x21, 0x00,
                0x39, 0x00, 0x58, 0x00, 0xBC, 0x00, 0x15, 0x02, 0xD1, 0x0B, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 5/2"),
        PatchOp::replace(
            0x05E41C,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x36, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x08, 0x00, 0x62, 0x00,
                0x22, 0x01, 0x7B, 0x02, 0x29, 0x05, 0xE4, 0x0A, 0x9A, 0x11, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x36, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x08, 0x00, 0x62, 0x00,
                0x22, 0x01, 0x7B, 0x02, 0x29, 0x05, 0xE4, 0x0A, 0x9A, 0x11, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 6/1"),
        PatchOp::replace(
            0x05E440,
            &[
                0x08, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x36, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x08, 0x00, 0x62, 0x00,
                0x22, 0x01, 0x7B, 0x02, 0x29, 0x05, 0xE4, 0x0A, 0x9A, 0x11, 0x00, 0x00,
            ],
            &[
                0x08, 0x00, 0x00, 0x00, 0x0D, 0x00, 0x36, 0x00, 0x6D, 0x00, 0xB1, 0x00,
                0x10, 0x01, 0x98, 0x01, 0x20, 0x02, 0x00, 0x00, 0x08, 0x00, 0x62, 0x00,
                0x22, 0x01, 0x7B, 0x02, 0x29, 0x05, 0xE4, 0x0A, 0x9A, 0x11, 0x00, 0x00,
            ],
        )
        .with_label("Steering map 6/2"),
        PatchOp::replace(
            0x05FFFC,
            b"Ende",
            b"\xFF\xFF\xFF\xFF",
        )
        .with_label("End of firmware marker"),
    ];

    let mut regions = sw3501_asw_regions();
    // Calibration area 0x5C000..0x5EFFE
    regions.extend([
        ChecksumRegion::new(0x05DFFC, 0x5C000, 0x5CFFF),
        ChecksumRegion::new(0x05DFFE, 0x5CFFF, 0x5DFFC),
        ChecksumRegion::new(0x05EFFE, 0x5E000, 0x5EFFE),
    ]);

    VariantProfile {
        variant: Variant::Sw3501,
        image_len: IMAGE_LEN,
        patch_table: PatchTable::new(ops, regions),
        flash_segments: vec![
            FlashSegment::new(676, 705),
            FlashSegment::new(588, 635),
            FlashSegment::new(532, 547),
            FlashSegment::new(508, 530),
            FlashSegment::new(4, 33),
            FlashSegment::new(0x0A000, 0x5FFFF),
        ],
    }
}

/// Application software CRCs: consecutive 0xFFF-byte blocks from 0xA000, the
/// last one clipped at 0x5C000, stored back to back from 0x5FEF8.
fn sw3501_asw_regions() -> Vec<ChecksumRegion> {
    (SW3501_ASW_START..SW3501_ASW_END)
        .step_by(SW3501_ASW_BLOCK)
        .enumerate()
        .map(|(i, start)| {
            let end = (start + SW3501_ASW_BLOCK).min(SW3501_ASW_END);
            ChecksumRegion::new(SW3501_ASW_CRC_TABLE + 2 * i, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asw_regions_match_layout() {
        let regions = sw3501_asw_regions();
        assert_eq!(regions.len(), 83);
        assert_eq!(regions[0], ChecksumRegion::new(0x05FEF8, 0x0A000, 0x0AFFF));
        assert_eq!(regions[1], ChecksumRegion::new(0x05FEFA, 0x0AFFF, 0x0BFFE));
        assert_eq!(regions[81], ChecksumRegion::new(0x05FF9A, 0x5AFAF, 0x5BFAE));
        assert_eq!(regions[82], ChecksumRegion::new(0x05FF9C, 0x5BFAE, 0x5C000));
    }

    #[test]
    fn sw3501_table_shape() {
        let profile = sw3501();
        assert_eq!(profile.patch_table.ops.len(), 16);
        assert_eq!(profile.patch_table.regions.len(), 86);
        assert_eq!(profile.flash_segments.len(), 6);
    }

    #[test]
    fn replacements_keep_length() {
        for profile in [sw2501(), sw3501()] {
            for op in &profile.patch_table.ops {
                let replacement = op.replacement.as_ref().unwrap();
                assert_eq!(replacement.len(), op.expected.len(), "op at 0x{:06X}", op.address);
            }
        }
    }
}
