//! KWP2000 negative response codes

use std::fmt;

/// KWP2000 negative response codes (ISO 14230-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeResponseCode {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupportedInvalidFormat,
    BusyRepeatRequest,
    ConditionsNotCorrectOrRequestSequenceError,
    RoutineNotComplete,
    RequestOutOfRange,
    SecurityAccessDenied,
    InvalidKey,
    ExceedNumberOfAttempts,
    RequiredTimeDelayNotExpired,
    DownloadNotAccepted,
    ImproperDownloadType,
    CantDownloadToSpecifiedAddress,
    CantDownloadNumberOfBytesRequested,
    TransferSuspended,
    TransferAborted,
    IllegalAddressInBlockTransfer,
    IllegalByteCountInBlockTransfer,
    BlockTransferDataChecksumError,
    ResponsePending,
    IncorrectByteCountDuringBlockTransfer,
    ServiceNotSupportedInActiveSession,

    /// Manufacturer specific or reserved
    Unknown(u8),
}

impl From<u8> for NegativeResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x10 => Self::GeneralReject,
            0x11 => Self::ServiceNotSupported,
            0x12 => Self::SubFunctionNotSupportedInvalidFormat,
            0x21 => Self::BusyRepeatRequest,
            0x22 => Self::ConditionsNotCorrectOrRequestSequenceError,
            0x23 => Self::RoutineNotComplete,
            0x31 => Self::RequestOutOfRange,
            0x33 => Self::SecurityAccessDenied,
            0x35 => Self::InvalidKey,
            0x36 => Self::ExceedNumberOfAttempts,
            0x37 => Self::RequiredTimeDelayNotExpired,
            0x40 => Self::DownloadNotAccepted,
            0x41 => Self::ImproperDownloadType,
            0x42 => Self::CantDownloadToSpecifiedAddress,
            0x43 => Self::CantDownloadNumberOfBytesRequested,
            0x71 => Self::TransferSuspended,
            0x72 => Self::TransferAborted,
            0x74 => Self::IllegalAddressInBlockTransfer,
            0x75 => Self::IllegalByteCountInBlockTransfer,
            0x77 => Self::BlockTransferDataChecksumError,
            0x78 => Self::ResponsePending,
            0x79 => Self::IncorrectByteCountDuringBlockTransfer,
            0x80 => Self::ServiceNotSupportedInActiveSession,
            other => Self::Unknown(other),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(nrc: NegativeResponseCode) -> Self {
        match nrc {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupportedInvalidFormat => 0x12,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrectOrRequestSequenceError => 0x22,
            NegativeResponseCode::RoutineNotComplete => 0x23,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::SecurityAccessDenied => 0x33,
            NegativeResponseCode::InvalidKey => 0x35,
            NegativeResponseCode::ExceedNumberOfAttempts => 0x36,
            NegativeResponseCode::RequiredTimeDelayNotExpired => 0x37,
            NegativeResponseCode::DownloadNotAccepted => 0x40,
            NegativeResponseCode::ImproperDownloadType => 0x41,
            NegativeResponseCode::CantDownloadToSpecifiedAddress => 0x42,
            NegativeResponseCode::CantDownloadNumberOfBytesRequested => 0x43,
            NegativeResponseCode::TransferSuspended => 0x71,
            NegativeResponseCode::TransferAborted => 0x72,
            NegativeResponseCode::IllegalAddressInBlockTransfer => 0x74,
            NegativeResponseCode::IllegalByteCountInBlockTransfer => 0x75,
            NegativeResponseCode::BlockTransferDataChecksumError => 0x77,
            NegativeResponseCode::ResponsePending => 0x78,
            NegativeResponseCode::IncorrectByteCountDuringBlockTransfer => 0x79,
            NegativeResponseCode::ServiceNotSupportedInActiveSession => 0x80,
            NegativeResponseCode::Unknown(v) => v,
        }
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "Unknown(0x{:02X})", v),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_known_codes() {
        for code in [0x10u8, 0x22, 0x33, 0x35, 0x78, 0x80] {
            assert_eq!(u8::from(NegativeResponseCode::from(code)), code);
        }
    }

    #[test]
    fn display() {
        assert_eq!(NegativeResponseCode::InvalidKey.to_string(), "InvalidKey");
        assert_eq!(NegativeResponseCode::from(0xFA).to_string(), "Unknown(0xFA)");
        assert_eq!(format!("{:02X}", NegativeResponseCode::ResponsePending), "78");
    }
}
