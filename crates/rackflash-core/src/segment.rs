//! Flash segments

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{PatchError, PatchResult};

/// A contiguous address range erased and rewritten as one unit.
///
/// Both bounds are inclusive, matching how the unit's download and routine
/// requests address memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSegment {
    pub start: u32,
    pub end: u32,
    /// Run another seed/key exchange between erase and transfer
    #[serde(default)]
    pub reauthenticate_after_erase: bool,
}

impl FlashSegment {
    pub const fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            reauthenticate_after_erase: false,
        }
    }

    pub fn with_reauthentication(mut self) -> Self {
        self.reauthenticate_after_erase = true;
        self
    }

    /// Number of bytes in the segment, at least one since both bounds are
    /// inclusive
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize + 1
    }

    /// Offsets into the image covered by this segment
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start as usize..=self.end as usize
    }

    /// Borrow the segment's bytes out of a full image
    pub fn slice<'a>(&self, image: &'a [u8]) -> PatchResult<&'a [u8]> {
        self.validate(image.len())?;
        Ok(&image[self.range()])
    }

    /// Check the segment is well-formed and inside an image of `image_len` bytes
    pub fn validate(&self, image_len: usize) -> PatchResult<()> {
        if self.start > self.end {
            return Err(PatchError::Config(format!(
                "Segment {} has start after end",
                self
            )));
        }
        if self.end as usize >= image_len {
            return Err(PatchError::Config(format!(
                "Segment {} runs past end of image (0x{:06X} bytes)",
                self, image_len
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FlashSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}..=0x{:06X}", self.start, self.end)
    }
}
