//! Transport configuration
//!
//! Deserialized from the `[transport]` table of the CLI config file.

use serde::{Deserialize, Serialize};

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// SocketCAN with ISO-TP (Linux only)
    SocketCan(SocketCanConfig),
    /// In-process mock unit
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::SocketCan(SocketCanConfig::default())
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// Interface name prefix; bus N opens `{prefix}{N}`
    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: String,
    /// ISO-TP configuration
    #[serde(default)]
    pub isotp: IsoTpConfig,
    /// Per-request response timeout
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for SocketCanConfig {
    fn default() -> Self {
        Self {
            interface_prefix: default_interface_prefix(),
            isotp: IsoTpConfig::default(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl SocketCanConfig {
    /// Interface name for bus index `bus`
    pub fn interface(&self, bus: u8) -> String {
        format!("{}{}", self.interface_prefix, bus)
    }
}

fn default_interface_prefix() -> String {
    "can".to_string()
}

fn default_response_timeout_ms() -> u64 {
    5000
}

/// ISO-TP addressing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoTpConfig {
    /// Transmit CAN ID (tester -> unit)
    #[serde(default = "default_tx_id")]
    pub tx_id: String,
    /// Receive CAN ID (unit -> tester)
    #[serde(default = "default_rx_id")]
    pub rx_id: String,
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            tx_id: default_tx_id(),
            rx_id: default_rx_id(),
        }
    }
}

fn default_tx_id() -> String {
    "0x712".to_string()
}

fn default_rx_id() -> String {
    "0x77C".to_string()
}

/// Mock transport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}
