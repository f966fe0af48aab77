//! SocketCAN adapter using ISO-TP for KWP2000 communication

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use socketcan::{ExtendedId, Id, StandardId};
use socketcan_isotp::IsoTpSocket;

use crate::config::SocketCanConfig;
use crate::kwp::service_id;
use crate::transport::{TransportAdapter, TransportError};

/// SocketCAN adapter using ISO-TP
///
/// The socket is created on [`TransportAdapter::open`] and replaced on every
/// reopen, since the unit tears the channel down on session change and erase.
pub struct SocketCanAdapter {
    config: SocketCanConfig,
    socket: Arc<Mutex<Option<IsoTpSocket>>>,
    tx_id: u32,
    rx_id: u32,
    connected: AtomicBool,
}

impl SocketCanAdapter {
    pub fn new(config: &SocketCanConfig) -> Result<Self, TransportError> {
        let tx_id = parse_can_id(&config.isotp.tx_id)?;
        let rx_id = parse_can_id(&config.isotp.rx_id)?;

        Ok(Self {
            config: config.clone(),
            socket: Arc::new(Mutex::new(None)),
            tx_id,
            rx_id,
            connected: AtomicBool::new(false),
        })
    }

    /// Drain any pending data from the socket to clear stale messages
    fn drain_socket(socket: &mut IsoTpSocket) {
        loop {
            match socket.read() {
                Ok(data) if !data.is_empty() => {
                    tracing::debug!(data = %hex::encode(data), "Drained stale message from socket");
                }
                Ok(_) | Err(_) => {
                    // No more data (WouldBlock on the non-blocking socket)
                    break;
                }
            }
        }
    }

    fn create_socket(interface: &str, tx_id: u32, rx_id: u32) -> Result<IsoTpSocket, TransportError> {
        let socket = IsoTpSocket::open(interface, can_id(rx_id)?, can_id(tx_id)?).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to open ISO-TP socket on {}: {}",
                interface, e
            ))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        Ok(socket)
    }

    /// Block until a response to `request_sid` arrives or `deadline` passes.
    ///
    /// Unrelated frames are skipped; negative responses for the request are
    /// returned as-is for the protocol layer to decode.
    fn read_response(
        socket: &mut IsoTpSocket,
        request_sid: Option<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        loop {
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout("Response timeout".to_string()));
            }

            match socket.read() {
                Ok(data) if !data.is_empty() => {
                    let matches = match request_sid {
                        None => true,
                        Some(sid) => {
                            data[0] == sid.wrapping_add(service_id::POSITIVE_RESPONSE_OFFSET)
                                || (data[0] == service_id::NEGATIVE_RESPONSE
                                    && data.get(1) == Some(&sid))
                        }
                    };
                    if matches {
                        return Ok(data.to_vec());
                    }
                    tracing::debug!(data = %hex::encode(data), "Ignoring non-matching response");
                }
                Ok(_) => std::thread::sleep(Duration::from_millis(1)),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

#[async_trait]
impl TransportAdapter for SocketCanAdapter {
    async fn open(&self, bus: u8) -> Result<(), TransportError> {
        let interface = self.config.interface(bus);
        let (tx_id, rx_id) = (self.tx_id, self.rx_id);

        let socket = tokio::task::spawn_blocking(move || {
            let mut socket = Self::create_socket(&interface, tx_id, rx_id)?;
            Self::drain_socket(&mut socket);
            Ok::<_, TransportError>(socket)
        })
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("Task join error: {}", e)))??;

        *self.socket.lock() = Some(socket);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(bus, tx_id = %format!("0x{:X}", tx_id), rx_id = %format!("0x{:X}", rx_id), "ISO-TP channel open");
        Ok(())
    }

    async fn send_receive(
        &self,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected()?;

        let socket = self.socket.clone();
        let request = request.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = socket.lock();
            let socket = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;

            socket
                .write(&request)
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;

            Self::read_response(socket, request.first().copied(), Instant::now() + timeout)
        })
        .await
        .map_err(|e| TransportError::ReceiveFailed(format!("Task join error: {}", e)))?
    }

    async fn receive(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected()?;

        let socket = self.socket.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = socket.lock();
            let socket = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
            Self::read_response(socket, None, Instant::now() + timeout)
        })
        .await
        .map_err(|e| TransportError::ReceiveFailed(format!("Task join error: {}", e)))?
    }

    async fn clear(&self) -> Result<(), TransportError> {
        if let Some(socket) = self.socket.lock().as_mut() {
            Self::drain_socket(socket);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.socket.lock().take();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// 11-bit IDs use standard frames, anything larger extended frames
fn can_id(raw: u32) -> Result<Id, TransportError> {
    let invalid = || TransportError::InvalidConfig(format!("Invalid CAN ID: 0x{:X}", raw));
    if raw <= 0x7FF {
        Ok(Id::Standard(StandardId::new(raw as u16).ok_or_else(invalid)?))
    } else {
        Ok(Id::Extended(ExtendedId::new(raw).ok_or_else(invalid)?))
    }
}

/// Parse a CAN ID from string (supports hex with 0x prefix)
fn parse_can_id(s: &str) -> Result<u32, TransportError> {
    let s = s.trim();
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };

    u32::from_str_radix(digits, radix)
        .map_err(|e| TransportError::InvalidConfig(format!("Invalid CAN ID '{}': {}", s, e)))
}
