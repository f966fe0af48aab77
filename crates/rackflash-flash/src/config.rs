//! Flash tuning knobs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlashError, FlashResult};
use crate::retry::RetryPolicy;

/// Chunk size used for data transfer; the unit must offer at least this much
pub const CHUNK_SIZE: usize = 240;

/// Flash configuration (the `[flash]` table of the CLI config file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashConfig {
    /// Bytes per transfer request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Reopen attempts after the unit drops the channel
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Wait before every reopen attempt
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

fn default_chunk_size() -> usize {
    CHUNK_SIZE
}

fn default_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

impl FlashConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconnect_attempts,
            Duration::from_millis(self.reconnect_backoff_ms),
        )
    }

    pub fn validate(&self) -> FlashResult<()> {
        if self.chunk_size == 0 {
            return Err(FlashError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.reconnect_attempts == 0 {
            return Err(FlashError::Config(
                "reconnect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FlashConfig::default();
        assert_eq!(config.chunk_size, 240);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(10, Duration::from_secs(1))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = FlashConfig {
            reconnect_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FlashError::Config(_))));
    }
}
