//! End-to-end patching of full-size images through the file API

use rackflash_core::patcher::patch_file;
use rackflash_core::{checksum, ChecksumStage, ExpectedValue, FirmwareImage, PatchError, Registry, Variant};
use rstest::rstest;

/// A synthetic stock dump: every patch site holds its stock bytes and every
/// checksum region is valid.
fn stock_image(variant: Variant) -> Vec<u8> {
    let profile = Registry::builtin().get(variant);
    let mut bytes = vec![0xFFu8; profile.image_len];
    for op in &profile.patch_table.ops {
        if let ExpectedValue::Exact(ref expected) = op.expected {
            bytes[op.range()].copy_from_slice(expected);
        }
    }
    checksum::update(&bytes, &profile.patch_table.regions)
}

#[rstest]
#[case(Variant::Sw2501)]
#[case(Variant::Sw3501)]
fn patches_builtin_variant(#[case] variant: Variant) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stock.bin");
    let output = dir.path().join("patched.bin");
    std::fs::write(&input, stock_image(variant)).unwrap();

    let profile = Registry::builtin().get(variant);
    let report = patch_file(&input, &output, profile).unwrap();

    let patched = std::fs::read(&output).unwrap();
    assert_eq!(patched.len(), profile.image_len);
    assert!(checksum::verify(&patched, &profile.patch_table.regions));
    assert_eq!(&patched[0x5FFFC..0x60000], &[0xFF; 4]);
    assert_eq!(report.ops_applied, profile.patch_table.ops.len());
    assert!(report.bytes_changed > 0);
}

#[test]
fn version_string_is_bumped() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stock.bin");
    let output = dir.path().join("patched.bin");
    std::fs::write(&input, stock_image(Variant::Sw3501)).unwrap();

    patch_file(&input, &output, Registry::builtin().get(Variant::Sw3501)).unwrap();

    let patched = std::fs::read(&output).unwrap();
    assert_eq!(&patched[0x5D828..0x5D838], b"1K0909144R \x003502");
}

#[test]
fn failure_leaves_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stock.bin");
    let output = dir.path().join("patched.bin");

    let mut bytes = stock_image(Variant::Sw2501);
    // Disengage countdown already changed by someone else
    bytes[0x5E221] = 0x00;
    std::fs::write(&input, &bytes).unwrap();

    let err = patch_file(&input, &output, Registry::builtin().get(Variant::Sw2501)).unwrap_err();
    // The checksum over the calibration area no longer matches either
    assert!(matches!(
        err,
        PatchError::Checksum {
            stage: ChecksumStage::Input,
            ..
        }
    ));
    assert!(!output.exists());
}

#[test]
fn patched_image_is_not_patchable_twice() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stock.bin");
    let once = dir.path().join("once.bin");
    let twice = dir.path().join("twice.bin");
    std::fs::write(&input, stock_image(Variant::Sw2501)).unwrap();

    let profile = Registry::builtin().get(Variant::Sw2501);
    patch_file(&input, &once, profile).unwrap();

    let err = patch_file(&once, &twice, profile).unwrap_err();
    assert!(matches!(err, PatchError::Verification { address: 0x5E7A8, .. }));
    assert!(!twice.exists());
}

#[test]
fn wrong_size_image_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("short.bin");
    let output = dir.path().join("patched.bin");
    std::fs::write(&input, vec![0u8; 0x1000]).unwrap();

    let err = patch_file(&input, &output, Registry::builtin().get(Variant::Sw3501)).unwrap_err();
    assert!(matches!(err, PatchError::Config(_)));
    assert!(!output.exists());
}

#[test]
fn same_input_gives_same_output() {
    let image = FirmwareImage::from_bytes(stock_image(Variant::Sw3501));
    let profile = Registry::builtin().get(Variant::Sw3501);
    let patcher = rackflash_core::Patcher::for_profile(profile);

    let (a, _) = patcher.apply(&image).unwrap();
    let (b, _) = patcher.apply(&image).unwrap();
    assert_eq!(a, b);
}
