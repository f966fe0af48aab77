//! Patch table types
//!
//! A patch table is pure configuration: an ordered list of byte edits and an
//! ordered list of CRC-protected regions. Addresses are absolute offsets into
//! the raw memory dump.

use std::ops::Range;

use crate::error::{PatchError, PatchResult};

/// What the patcher expects to find at a patch address before editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedValue {
    /// These exact bytes must be present
    Exact(Vec<u8>),
    /// Do not check `len` bytes; an earlier op already changed them or stock
    /// dumps differ here
    SkipVerification { len: usize },
}

impl ExpectedValue {
    /// Number of bytes covered by the expectation
    pub fn len(&self) -> usize {
        match self {
            ExpectedValue::Exact(bytes) => bytes.len(),
            ExpectedValue::SkipVerification { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check `actual` against this expectation (always true for wildcards)
    pub fn matches(&self, actual: &[u8]) -> bool {
        match self {
            ExpectedValue::Exact(bytes) => bytes.as_slice() == actual,
            ExpectedValue::SkipVerification { .. } => true,
        }
    }
}

/// A single byte-level edit (or verification-only check)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOp {
    pub address: usize,
    pub expected: ExpectedValue,
    pub replacement: Option<Vec<u8>>,
    /// Free-form note carried from the table source
    pub label: Option<String>,
}

impl PatchOp {
    /// Replace `original` with `replacement` at `address`
    pub fn replace(address: usize, original: &[u8], replacement: &[u8]) -> Self {
        Self {
            address,
            expected: ExpectedValue::Exact(original.to_vec()),
            replacement: Some(replacement.to_vec()),
            label: None,
        }
    }

    /// Only check that `original` is present at `address`
    pub fn verify_only(address: usize, original: &[u8]) -> Self {
        Self {
            address,
            expected: ExpectedValue::Exact(original.to_vec()),
            replacement: None,
            label: None,
        }
    }

    /// Write `replacement` without checking the current contents
    pub fn overwrite(address: usize, replacement: &[u8]) -> Self {
        Self {
            address,
            expected: ExpectedValue::SkipVerification {
                len: replacement.len(),
            },
            replacement: Some(replacement.to_vec()),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Byte range touched by this op
    pub fn range(&self) -> Range<usize> {
        self.address..self.address + self.expected.len()
    }
}

/// A CRC-16 stored at `checksum_offset` covering `range_start..range_end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumRegion {
    pub checksum_offset: usize,
    pub range_start: usize,
    pub range_end: usize,
}

impl ChecksumRegion {
    pub const fn new(checksum_offset: usize, range_start: usize, range_end: usize) -> Self {
        Self {
            checksum_offset,
            range_start,
            range_end,
        }
    }

    /// Protected byte range (end exclusive)
    pub fn range(&self) -> Range<usize> {
        self.range_start..self.range_end
    }
}

/// Ordered patch operations plus the checksum regions to refresh afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchTable {
    pub ops: Vec<PatchOp>,
    pub regions: Vec<ChecksumRegion>,
}

impl PatchTable {
    pub fn new(ops: Vec<PatchOp>, regions: Vec<ChecksumRegion>) -> Self {
        Self { ops, regions }
    }

    /// Check the table is structurally usable on an image of `image_len` bytes.
    ///
    /// Every op and region must lie inside the image and every replacement
    /// must be as long as its expectation.
    pub fn validate(&self, image_len: usize) -> PatchResult<()> {
        for op in &self.ops {
            if op.expected.is_empty() {
                return Err(PatchError::Config(format!(
                    "Patch at 0x{:06X} covers no bytes",
                    op.address
                )));
            }
            if op.range().end > image_len {
                return Err(PatchError::Config(format!(
                    "Patch at 0x{:06X} ({} bytes) runs past end of image (0x{:06X})",
                    op.address,
                    op.expected.len(),
                    image_len
                )));
            }
            if let Some(ref replacement) = op.replacement {
                if replacement.len() != op.expected.len() {
                    return Err(PatchError::Length {
                        address: op.address,
                        expected: op.expected.len(),
                        actual: replacement.len(),
                    });
                }
            }
        }

        for region in &self.regions {
            if region.range_start > region.range_end {
                return Err(PatchError::Config(format!(
                    "Checksum region at 0x{:06X} has inverted range 0x{:06X}..0x{:06X}",
                    region.checksum_offset, region.range_start, region.range_end
                )));
            }
            if region.range_end > image_len || region.checksum_offset + 2 > image_len {
                return Err(PatchError::Config(format!(
                    "Checksum region at 0x{:06X} lies outside image (0x{:06X})",
                    region.checksum_offset, image_len
                )));
            }
        }

        Ok(())
    }
}
