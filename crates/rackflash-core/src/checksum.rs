//! Checksum engine
//!
//! Firmware regions are protected by CRC-16/XMODEM (poly 0x1021, init 0,
//! no reflection, no final XOR) stored big-endian inside the image. The
//! on-device checksum routine used after a transfer takes a plain 16-bit
//! additive sum instead.

use crc::{Crc, CRC_16_XMODEM};

use crate::patch::ChecksumRegion;

/// CRC-16 calculator (XMODEM / CCITT with zero init)
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM of `data`, big-endian encoded
pub fn crc16(data: &[u8]) -> [u8; 2] {
    CRC16.checksum(data).to_be_bytes()
}

/// Unsigned sum of all bytes, modulo 2^16
pub fn sum16(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// A region whose stored checksum disagrees with its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub region: ChecksumRegion,
    pub stored: u16,
    pub computed: u16,
}

/// Find the first region whose stored CRC does not match its range.
///
/// Regions must lie inside `image`; callers validate that up front.
pub fn first_mismatch(image: &[u8], regions: &[ChecksumRegion]) -> Option<ChecksumMismatch> {
    regions.iter().find_map(|region| {
        let stored = u16::from_be_bytes([
            image[region.checksum_offset],
            image[region.checksum_offset + 1],
        ]);
        let computed = u16::from_be_bytes(crc16(&image[region.range()]));
        (stored != computed).then_some(ChecksumMismatch {
            region: *region,
            stored,
            computed,
        })
    })
}

/// True iff every region's stored CRC matches its range
pub fn verify(image: &[u8], regions: &[ChecksumRegion]) -> bool {
    first_mismatch(image, regions).is_none()
}

/// Return a copy of `image` with every region's checksum rewritten.
///
/// All CRCs are computed over the unmodified input first and written
/// afterwards, so the result does not depend on region order.
pub fn update(image: &[u8], regions: &[ChecksumRegion]) -> Vec<u8> {
    let sums: Vec<[u8; 2]> = regions.iter().map(|r| crc16(&image[r.range()])).collect();

    let mut out = image.to_vec();
    for (region, sum) in regions.iter().zip(sums) {
        out[region.checksum_offset..region.checksum_offset + 2].copy_from_slice(&sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_empty_is_zero() {
        assert_eq!(crc16(b""), [0x00, 0x00]);
    }

    #[test]
    fn crc16_check_value() {
        assert_eq!(crc16(b"123456789"), [0x31, 0xC3]);
    }

    #[test]
    fn sum16_wraps() {
        assert_eq!(sum16(&[]), 0);
        assert_eq!(sum16(&[0x01, 0x02, 0xFF]), 0x0102);
        // 0x101 * 0xFF = 0x100FF, truncated to 16 bits
        assert_eq!(sum16(&[0xFF; 0x101]), 0x00FF);
    }

    #[test]
    fn update_then_verify() {
        let mut image = vec![0u8; 0x40];
        image[..9].copy_from_slice(b"123456789");
        let regions = [ChecksumRegion::new(0x20, 0x00, 0x09)];

        assert!(!verify(&image, &regions));

        let updated = update(&image, &regions);
        assert_eq!(&updated[0x20..0x22], &[0x31, 0xC3]);
        assert!(verify(&updated, &regions));
        assert_eq!(updated.len(), image.len());
    }

    #[test]
    fn mismatch_reports_values() {
        let mut image = vec![0u8; 0x10];
        image[0] = 0x31;
        let regions = [ChecksumRegion::new(0x0E, 0x00, 0x04)];

        let mismatch = first_mismatch(&image, &regions).unwrap();
        assert_eq!(mismatch.stored, 0x0000);
        assert_eq!(mismatch.computed, u16::from_be_bytes(crc16(&image[..4])));
        assert_eq!(mismatch.region, regions[0]);
    }

    #[test]
    fn update_uses_pre_update_contents() {
        // Second region's range covers the first region's checksum bytes
        let image = vec![0xA5u8; 0x20];
        let regions = [
            ChecksumRegion::new(0x00, 0x04, 0x08),
            ChecksumRegion::new(0x10, 0x00, 0x08),
        ];

        let updated = update(&image, &regions);
        assert_eq!(&updated[0x10..0x12], &crc16(&image[0x00..0x08]));
        // The nested region is stale after the write, which verify catches
        assert!(!verify(&updated, &regions));
    }
}
