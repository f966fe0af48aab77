//! rackflash-kwp - KWP2000 backend for the rack flash sequence
//!
//! This crate talks to the steering rack control unit over CAN and provides
//! the [`DiagnosticSession`](rackflash_flash::DiagnosticSession) the flash
//! orchestrator drives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Orchestrator (rackflash-flash)       │
//! └──────────────────┬───────────────────┘
//!                    │ DiagnosticSession
//!            ┌───────┴────────┐
//!            │ Kwp2000Client  │
//!            │ (protocol)     │
//!            └───────┬────────┘
//!                    │
//!           ┌────────┴─────────┐
//!           │ TransportAdapter │
//!           │ (SocketCAN/mock) │
//!           └──────────────────┘
//! ```

pub mod config;
pub mod kwp;
pub mod transport;

pub use config::{IsoTpConfig, MockConfig, SocketCanConfig, TransportConfig};
pub use kwp::{Kwp2000Client, KwpError, NegativeResponseCode};
pub use transport::{create_transport, TransportAdapter, TransportError};
