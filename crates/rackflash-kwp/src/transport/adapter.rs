//! Transport adapter trait and types

use std::time::Duration;

use async_trait::async_trait;

use super::TransportError;

/// Transport-agnostic interface for KWP2000 communication
///
/// The channel is opened explicitly per bus because the unit drops it on
/// every session change and erase, and the flash sequence reopens it.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Open (or reopen) the channel on bus index `bus`
    async fn open(&self, bus: u8) -> Result<(), TransportError>;

    /// Send a request and wait for the matching response
    ///
    /// # Arguments
    /// * `request` - The raw KWP2000 request bytes
    /// * `timeout` - Maximum time to wait for a response
    async fn send_receive(
        &self,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Wait for the next message without sending anything (follow-up after a
    /// response-pending answer)
    async fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Discard anything still buffered from a previous channel
    async fn clear(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Allow diagnostic traffic on the interface (adapters that filter
    /// outgoing frames by default override this)
    async fn set_permissive_output(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close the local end of the channel
    async fn close(&self) -> Result<(), TransportError>;

    /// Check if the channel is open
    async fn is_connected(&self) -> bool;
}
