//! KWP2000 protocol errors

use rackflash_flash::ProviderError;
use thiserror::Error;

use super::NegativeResponseCode;
use crate::transport::TransportError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KwpError {
    #[error("Negative response: {nrc} (0x{nrc:02X}) for service 0x{service_id:02X}")]
    NegativeResponse {
        service_id: u8,
        nrc: NegativeResponseCode,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<KwpError> for ProviderError {
    fn from(err: KwpError) -> Self {
        match err {
            KwpError::NegativeResponse { service_id, nrc } => ProviderError::Rejected {
                service: service_id,
                code: nrc.into(),
                reason: nrc.to_string(),
            },
            KwpError::InvalidResponse(msg) => ProviderError::InvalidResponse(msg),
            KwpError::Timeout => ProviderError::Transport("response timeout".to_string()),
            KwpError::Transport(e) => ProviderError::Transport(e.to_string()),
        }
    }
}
