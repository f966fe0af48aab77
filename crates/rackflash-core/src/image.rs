//! Raw firmware images
//!
//! An image is a plain memory dump of the control unit. There is no header:
//! offset N in the file is address N on the device, and the total length is
//! fixed per variant.

use std::path::Path;

use crate::error::{PatchError, PatchResult};

/// An immutable firmware memory dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
}

impl FirmwareImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Read a dump from disk
    pub fn read(path: &Path) -> PatchResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { bytes })
    }

    /// Write the dump to disk
    pub fn write(&self, path: &Path) -> PatchResult<()> {
        std::fs::write(path, &self.bytes).map_err(|source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Ensure the image has exactly the length a variant expects
    pub fn expect_len(&self, expected: usize) -> PatchResult<()> {
        if self.bytes.len() != expected {
            return Err(PatchError::Config(format!(
                "Image is {} bytes (0x{:X}), variant expects {} bytes (0x{:X})",
                self.bytes.len(),
                self.bytes.len(),
                expected,
                expected
            )));
        }
        Ok(())
    }
}

impl AsRef<[u8]> for FirmwareImage {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expect_len() {
        let image = FirmwareImage::from_bytes(vec![0; 0x100]);
        assert!(image.expect_len(0x100).is_ok());
        assert!(matches!(image.expect_len(0x60000), Err(PatchError::Config(_))));
    }

    #[test]
    fn read_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");

        let image = FirmwareImage::from_bytes(vec![0xAB; 32]);
        image.write(&path).unwrap();

        let loaded = FirmwareImage::read(&path).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn read_missing_file() {
        let err = FirmwareImage::read(Path::new("/nonexistent/fw.bin")).unwrap_err();
        assert!(matches!(err, PatchError::Io { .. }));
    }
}
