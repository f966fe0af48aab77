//! Flash error types

use rackflash_core::{ChecksumRegion, FlashSegment, PatchError};
use thiserror::Error;

use crate::provider::{ProviderError, RoutineId};

/// Result type for flash operations
pub type FlashResult<T> = Result<T, FlashError>;

/// Errors that abort a flash run
#[derive(Debug, Error)]
pub enum FlashError {
    /// Declined at the confirmation prompt; nothing was sent
    #[error("Flash aborted by user")]
    UserAbort,

    /// Channel could not be (re)opened within the retry budget
    #[error("Transport unavailable after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The unit answered, but not the way programming requires
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A request failed outside reconnection
    #[error("{step} failed: {source}")]
    Diagnostic {
        step: &'static str,
        #[source]
        source: ProviderError,
    },

    /// Image does not fit the variant or segment layout
    #[error(transparent)]
    Image(#[from] PatchError),

    /// A checksum region of the image does not hold the CRC of its range
    #[error(
        "Checksum mismatch at 0x{:06X} (range 0x{:06X}..0x{:06X}): stored {stored:04X}, computed {computed:04X}",
        .region.checksum_offset,
        .region.range_start,
        .region.range_end
    )]
    Checksum {
        region: ChecksumRegion,
        stored: u16,
        computed: u16,
    },

    #[error("Invalid flash configuration: {0}")]
    Config(String),
}

/// Unexpected but well-formed answers from the unit
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{routine} routine failed for segment {segment}: result {result}")]
    RoutineFailed {
        routine: RoutineId,
        segment: FlashSegment,
        /// Hex-encoded result bytes
        result: String,
    },

    #[error("Unit accepts {offered}-byte chunks for segment {segment}, at least {required} needed")]
    ChunkSizeTooSmall {
        segment: FlashSegment,
        offered: usize,
        required: usize,
    },

    #[error("Seed must be 4 bytes, got '{0}'")]
    InvalidSeed(String),
}

impl FlashError {
    pub(crate) fn diagnostic(step: &'static str) -> impl FnOnce(ProviderError) -> FlashError {
        move |source| FlashError::Diagnostic { step, source }
    }
}
