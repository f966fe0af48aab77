//! KWP2000 (ISO 14230) protocol layer
//!
//! Only the services needed to identify, unlock and reprogram the rack are
//! implemented.

mod client;
mod error;
mod nrc;

pub use client::Kwp2000Client;
pub use error::KwpError;
pub use nrc::NegativeResponseCode;

/// KWP2000 service ID constants
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const READ_ECU_IDENTIFICATION: u8 = 0x1A;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const START_ROUTINE_BY_LOCAL_ID: u8 = 0x31;
    pub const REQUEST_ROUTINE_RESULTS_BY_LOCAL_ID: u8 = 0x33;
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
    pub const STOP_COMMUNICATION: u8 = 0x82;

    /// Positive responses echo the request SID plus this offset
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
}

/// DiagnosticSessionControl (0x10) session types
pub mod session_type {
    pub const DEFAULT: u8 = 0x81;
    pub const PROGRAMMING: u8 = 0x85;
}

/// SecurityAccess (0x27) access types
pub mod access_type {
    pub const PROGRAMMING_REQUEST_SEED: u8 = 0x01;
    pub const PROGRAMMING_SEND_KEY: u8 = 0x02;
}

/// ReadEcuIdentification (0x1A) options
pub mod identification_option {
    pub const ECU_IDENT: u8 = 0x9B;
    pub const STATUS_FLASH: u8 = 0x9C;
}

/// Local routine identifiers for 0x31 / 0x33
pub mod routine_local_id {
    pub const ERASE_FLASH: u8 = 0xC4;
    pub const CALCULATE_FLASH_CHECKSUM: u8 = 0xC5;
}

/// TesterPresent (0x3E) response required
pub const TESTER_PRESENT_RESPONSE_REQUIRED: u8 = 0x01;

/// RequestDownload (0x34) data format: uncompressed, unencrypted
pub const DATA_FORMAT_RAW: u8 = 0x00;
