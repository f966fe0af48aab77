//! Patch engine errors

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// When a checksum region was found to be inconsistent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStage {
    /// The stock image handed to the patcher is already corrupt
    Input,
    /// Checksums still disagree after recomputation (broken patch table)
    Output,
}

impl fmt::Display for ChecksumStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumStage::Input => write!(f, "input image"),
            ChecksumStage::Output => write!(f, "patched image"),
        }
    }
}

/// Errors raised while patching a firmware image.
///
/// Every variant is fatal: the patcher never produces partial output.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Bytes in the image do not match an exact expectation
    #[error(
        "Unexpected bytes at 0x{address:06X}: found {}, expected {}",
        hex::encode(actual),
        hex::encode(expected)
    )]
    Verification {
        address: usize,
        actual: Vec<u8>,
        expected: Vec<u8>,
    },

    /// A write or the overall image did not keep its intended length
    #[error("Length mismatch at 0x{address:06X}: expected {expected} bytes, got {actual}")]
    Length {
        address: usize,
        expected: usize,
        actual: usize,
    },

    /// A checksum region does not hold the CRC of its range
    #[error(
        "Checksum mismatch in {stage} at 0x{offset:06X} (range 0x{range_start:06X}..0x{range_end:06X}): stored {stored:04X}, computed {computed:04X}"
    )]
    Checksum {
        stage: ChecksumStage,
        offset: usize,
        range_start: usize,
        range_end: usize,
        stored: u16,
        computed: u16,
    },

    /// Patch table, segment list or image size are inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing an image file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PatchResult<T> = Result<T, PatchError>;
