//! Diagnostic session provider trait
//!
//! The orchestrator never encodes a request itself. Everything that reaches
//! the bus goes through [`DiagnosticSession`], which a protocol client (or
//! the simulated unit in [`crate::sim`]) implements.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors reported by a session provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Channel could not be opened, was lost, or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// The unit answered with a negative response
    #[error("Request rejected: service 0x{service:02X}, code 0x{code:02X} ({reason})")]
    Rejected {
        service: u8,
        code: u8,
        reason: String,
    },

    /// The unit answered with something that cannot be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this failure concerns the channel rather than the unit's answer
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

/// Diagnostic session kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Default,
    Programming,
}

/// Identification records readable from the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentificationKind {
    /// Part number, software version and such
    EcuIdentification,
    /// Programming attempts and flash state
    FlashStatus,
}

/// On-device routines used during programming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineId {
    EraseFlash,
    FlashChecksum,
}

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineId::EraseFlash => f.write_str("erase"),
            RoutineId::FlashChecksum => f.write_str("checksum"),
        }
    }
}

/// Acknowledgement for a started routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineHandle {
    pub routine: RoutineId,
    /// Raw status bytes returned when the routine was started
    pub status: Vec<u8>,
}

/// One programming-capable diagnostic session with a control unit.
///
/// Calls are made strictly one at a time by a single owner, hence `&mut self`.
#[async_trait]
pub trait DiagnosticSession: Send {
    /// Put the bus interface into the mode that allows programming traffic
    async fn set_permissive_output(&mut self) -> ProviderResult<()>;

    /// Drop any buffered or stale channel state
    async fn clear_channel(&mut self) -> ProviderResult<()>;

    /// Open the transport channel on `bus`
    async fn open(&mut self, bus: u8) -> ProviderResult<()>;

    /// Switch diagnostic session. Entering programming resets the unit's
    /// transport, so the channel must be reopened afterwards.
    async fn enter_session(&mut self, kind: SessionKind) -> ProviderResult<()>;

    async fn request_seed(&mut self) -> ProviderResult<Vec<u8>>;

    async fn send_key(&mut self, key: &[u8]) -> ProviderResult<()>;

    async fn read_identification(&mut self, kind: IdentificationKind) -> ProviderResult<Vec<u8>>;

    /// Open a download window for `len` bytes at `address`.
    ///
    /// Returns the largest transfer chunk the unit accepts.
    async fn request_download(&mut self, address: u32, len: u32) -> ProviderResult<usize>;

    /// Start erasing `start..=end`. The unit drops the channel while erasing.
    async fn start_erase(&mut self, start: u32, end: u32) -> ProviderResult<RoutineHandle>;

    /// Start the on-device checksum check over `start..=end`
    async fn start_checksum(
        &mut self,
        start: u32,
        end: u32,
        checksum: u16,
    ) -> ProviderResult<RoutineHandle>;

    /// Collect the result of a previously started routine
    async fn routine_result(&mut self, routine: RoutineId) -> ProviderResult<Vec<u8>>;

    async fn transfer_data(&mut self, chunk: &[u8]) -> ProviderResult<()>;

    async fn transfer_exit(&mut self) -> ProviderResult<()>;

    /// Keep the channel from timing out between requests
    async fn keep_alive(&mut self) -> ProviderResult<()>;

    async fn stop_communication(&mut self) -> ProviderResult<()>;

    /// Close the local end of the channel
    async fn release(&mut self) -> ProviderResult<()>;
}
