//! All-or-nothing firmware patcher
//!
//! The patcher works on a private copy of the image. Nothing is returned (and
//! nothing is written to disk by [`patch_file`]) unless every step succeeds:
//!
//! 1. the stock image's checksum regions are intact
//! 2. every patch op finds its expected bytes, and every write lands with
//!    exactly the intended length
//! 3. checksums are recomputed and verify cleanly
//! 4. the output is exactly as long as the input

use std::path::Path;

use tracing::{debug, info};

use crate::checksum;
use crate::error::{ChecksumStage, PatchError, PatchResult};
use crate::image::FirmwareImage;
use crate::patch::{ChecksumRegion, ExpectedValue, PatchTable};
use crate::variant::VariantProfile;

/// Summary of a successful patch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Ops that wrote a replacement
    pub ops_applied: usize,
    /// Ops that only verified the current contents
    pub ops_verified: usize,
    /// Checksum regions refreshed
    pub regions_updated: usize,
    /// Bytes that differ between input and output (checksums included)
    pub bytes_changed: usize,
}

/// Applies one patch table, optionally pinned to an image length
#[derive(Debug, Clone, Copy)]
pub struct Patcher<'a> {
    table: &'a PatchTable,
    image_len: Option<usize>,
}

impl<'a> Patcher<'a> {
    pub fn new(table: &'a PatchTable) -> Self {
        Self {
            table,
            image_len: None,
        }
    }

    /// Patcher for a registered variant (enforces its image length)
    pub fn for_profile(profile: &'a VariantProfile) -> Self {
        Self {
            table: &profile.patch_table,
            image_len: Some(profile.image_len),
        }
    }

    /// Apply the table, returning the patched image and a report
    pub fn apply(&self, image: &FirmwareImage) -> PatchResult<(FirmwareImage, PatchReport)> {
        let input = image.as_bytes();

        if let Some(len) = self.image_len {
            image.expect_len(len)?;
        }
        self.table.validate(input.len())?;

        check_regions(input, &self.table.regions, ChecksumStage::Input)?;

        let mut working = input.to_vec();
        let mut report = PatchReport::default();

        for op in &self.table.ops {
            let range = op.range();
            let current = &working[range.clone()];

            // Wildcards skip the check for this op only
            if let ExpectedValue::Exact(ref expected) = op.expected {
                if expected.as_slice() != current {
                    return Err(PatchError::Verification {
                        address: op.address,
                        actual: current.to_vec(),
                        expected: expected.clone(),
                    });
                }
            }

            match op.replacement {
                Some(ref replacement) => {
                    working.splice(range.clone(), replacement.iter().copied());

                    let written = working.get(range.clone()).unwrap_or_default();
                    if written != replacement.as_slice() || working.len() != input.len() {
                        return Err(PatchError::Length {
                            address: op.address,
                            expected: replacement.len(),
                            actual: written.len(),
                        });
                    }

                    debug!(
                        address = %format!("0x{:06X}", op.address),
                        len = replacement.len(),
                        label = op.label.as_deref().unwrap_or(""),
                        "Patch applied"
                    );
                    report.ops_applied += 1;
                }
                None => {
                    debug!(
                        address = %format!("0x{:06X}", op.address),
                        "Patch site verified"
                    );
                    report.ops_verified += 1;
                }
            }
        }

        let output = checksum::update(&working, &self.table.regions);
        report.regions_updated = self.table.regions.len();

        check_regions(&output, &self.table.regions, ChecksumStage::Output)?;

        if output.len() != input.len() {
            return Err(PatchError::Length {
                address: 0,
                expected: input.len(),
                actual: output.len(),
            });
        }

        report.bytes_changed = input
            .iter()
            .zip(output.iter())
            .filter(|(a, b)| a != b)
            .count();

        info!(
            ops_applied = report.ops_applied,
            ops_verified = report.ops_verified,
            regions = report.regions_updated,
            bytes_changed = report.bytes_changed,
            "Image patched"
        );

        Ok((FirmwareImage::from_bytes(output), report))
    }

    /// Only verify the checksum regions of `image`
    pub fn verify(&self, image: &FirmwareImage) -> PatchResult<()> {
        if let Some(len) = self.image_len {
            image.expect_len(len)?;
        }
        self.table.validate(image.len())?;
        check_regions(image.as_bytes(), &self.table.regions, ChecksumStage::Input)
    }
}

/// Apply `table` to `image` (no length pinning)
pub fn apply(image: &FirmwareImage, table: &PatchTable) -> PatchResult<FirmwareImage> {
    Patcher::new(table).apply(image).map(|(image, _)| image)
}

/// Read `input`, patch it for `profile` and write `output`.
///
/// The output file is only created after the whole patch succeeded.
pub fn patch_file(input: &Path, output: &Path, profile: &VariantProfile) -> PatchResult<PatchReport> {
    let image = FirmwareImage::read(input)?;
    info!(
        variant = %profile.variant,
        input = %input.display(),
        size = image.len(),
        "Patching image"
    );

    let (patched, report) = Patcher::for_profile(profile).apply(&image)?;
    patched.write(output)?;

    info!(output = %output.display(), "Patched image written");
    Ok(report)
}

fn check_regions(image: &[u8], regions: &[ChecksumRegion], stage: ChecksumStage) -> PatchResult<()> {
    match checksum::first_mismatch(image, regions) {
        None => Ok(()),
        Some(mismatch) => Err(PatchError::Checksum {
            stage,
            offset: mismatch.region.checksum_offset,
            range_start: mismatch.region.range_start,
            range_end: mismatch.region.range_end,
            stored: mismatch.stored,
            computed: mismatch.computed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOp;
    use pretty_assertions::assert_eq;

    /// 0x102-byte image: payload 0..0x100, CRC of the payload at 0x100
    fn sample_image() -> (FirmwareImage, Vec<ChecksumRegion>) {
        let mut bytes: Vec<u8> = (0..0x102).map(|i| (i * 7) as u8).collect();
        bytes[0x10..0x13].copy_from_slice(&[0xAB, 0xCD, 0xEF]);
        let regions = vec![ChecksumRegion::new(0x100, 0x000, 0x100)];
        let bytes = checksum::update(&bytes, &regions);
        (FirmwareImage::from_bytes(bytes), regions)
    }

    #[test]
    fn three_byte_patch_end_to_end() {
        let (image, regions) = sample_image();
        let table = PatchTable::new(
            vec![PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0x00, 0x00, 0x00])],
            regions,
        );

        let (out, report) = Patcher::new(&table).apply(&image).unwrap();
        let out = out.as_bytes();

        assert_eq!(&out[0x10..0x13], &[0x00, 0x00, 0x00]);
        assert_eq!(&out[0x100..0x102], &checksum::crc16(&out[0x000..0x100]));
        assert_eq!(out.len(), image.len());
        assert_eq!(report.ops_applied, 1);
        assert_eq!(report.regions_updated, 1);
    }

    #[test]
    fn mismatch_aborts_with_details() {
        let (image, regions) = sample_image();
        let table = PatchTable::new(
            vec![
                PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0, 0, 0]),
                PatchOp::replace(0x20, &[0x11, 0x22], &[0, 0]),
            ],
            regions,
        );

        let err = Patcher::new(&table).apply(&image).unwrap_err();
        match err {
            PatchError::Verification {
                address,
                actual,
                expected,
            } => {
                assert_eq!(address, 0x20);
                assert_eq!(actual, image.as_bytes()[0x20..0x22].to_vec());
                assert_eq!(expected, vec![0x11, 0x22]);
            }
            other => panic!("Expected Verification, got {:?}", other),
        }
    }

    #[test]
    fn corrupt_input_rejected_before_patching() {
        let (image, regions) = sample_image();
        let mut bytes = image.into_bytes();
        bytes[0x80] ^= 0xFF;
        let image = FirmwareImage::from_bytes(bytes);

        let table = PatchTable::new(
            vec![PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0, 0, 0])],
            regions,
        );

        let err = Patcher::new(&table).apply(&image).unwrap_err();
        assert!(matches!(
            err,
            PatchError::Checksum {
                stage: ChecksumStage::Input,
                offset: 0x100,
                ..
            }
        ));
    }

    #[test]
    fn wildcard_only_skips_its_own_op() {
        let (image, regions) = sample_image();
        let table = PatchTable::new(
            vec![
                PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0x01, 0x02, 0x03]),
                // Overlaps the first write; stock value no longer present
                PatchOp::overwrite(0x11, &[0x55]),
                // Exact op elsewhere still checked
                PatchOp::verify_only(0x40, &[0xFF]),
            ],
            regions,
        );

        assert!(matches!(
            Patcher::new(&table).apply(&image),
            Err(PatchError::Verification { address: 0x40, .. })
        ));
    }

    #[test]
    fn later_ops_see_earlier_writes() {
        let (image, regions) = sample_image();
        let table = PatchTable::new(
            vec![
                PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0x01, 0x02, 0x03]),
                PatchOp::overwrite(0x11, &[0x55]),
                PatchOp::verify_only(0x10, &[0x01, 0x55, 0x03]),
            ],
            regions,
        );

        let (out, report) = Patcher::new(&table).apply(&image).unwrap();
        assert_eq!(&out.as_bytes()[0x10..0x13], &[0x01, 0x55, 0x03]);
        assert_eq!(report.ops_applied, 2);
        assert_eq!(report.ops_verified, 1);
    }

    #[test]
    fn overlapping_checksum_region_is_a_table_defect() {
        let bytes = vec![0x5Au8; 0x40];
        // Second region covers the first region's stored checksum
        let regions = vec![
            ChecksumRegion::new(0x00, 0x10, 0x20),
            ChecksumRegion::new(0x30, 0x00, 0x20),
        ];
        let image =
            FirmwareImage::from_bytes(checksum::update(&checksum::update(&bytes, &regions), &regions));
        let table = PatchTable::new(vec![PatchOp::replace(0x18, &[0x5A], &[0x00])], regions);

        assert!(matches!(
            Patcher::new(&table).apply(&image),
            Err(PatchError::Checksum {
                stage: ChecksumStage::Output,
                ..
            })
        ));
    }

    #[test]
    fn idempotent_on_same_input() {
        let (image, regions) = sample_image();
        let table = PatchTable::new(
            vec![PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0, 0, 0])],
            regions,
        );

        let first = apply(&image, &table).unwrap();
        let second = apply(&image, &table).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expected_value_carried_on_wildcard_len() {
        let op = PatchOp::overwrite(0x10, &[1, 2, 3, 4]);
        assert_eq!(op.expected, ExpectedValue::SkipVerification { len: 4 });
    }
}
