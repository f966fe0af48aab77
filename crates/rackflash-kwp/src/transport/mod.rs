//! Transport layer for KWP2000 communication
//!
//! This module provides transport adapters for talking to the rack:
//! - SocketCAN adapter for CAN/ISO-TP (Linux only)
//! - Mock adapter that answers like a healthy unit, for dry runs and tests
//!
//! # Example
//!
//! ```ignore
//! use rackflash_kwp::transport::{create_transport, TransportAdapter};
//! use rackflash_kwp::config::TransportConfig;
//!
//! let transport = create_transport(&TransportConfig::Mock(Default::default()))?;
//! transport.open(1).await?;
//! let response = transport.send_receive(&[0x3E, 0x01], Duration::from_secs(5)).await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::TransportAdapter;
pub use error::TransportError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport adapter based on configuration. The channel is not
/// opened yet.
pub fn create_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn TransportAdapter>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan(cfg) => {
            let adapter = socketcan::SocketCanAdapter::new(cfg)?;
            Ok(Arc::new(adapter))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan(_) => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => {
            let adapter = mock::MockTransportAdapter::new(cfg);
            Ok(Arc::new(adapter))
        }
    }
}
