//! Mock transport adapter for dry runs and testing
//!
//! Answers like a healthy rack unit. Scripted responses queued with
//! [`MockTransportAdapter::queue_response`] take precedence over the
//! request/response table.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{TransportAdapter, TransportError};
use crate::config::MockConfig;

/// Identification string reported for 0x1A 0x9B
pub const MOCK_IDENTIFICATION: &[u8] = b"1K0909144R  3501";

/// Mock transport adapter for testing
pub struct MockTransportAdapter {
    config: MockConfig,
    connected: AtomicBool,
    /// Predefined responses for testing (request prefix -> response mapping)
    responses: RwLock<Vec<(Vec<u8>, Vec<u8>)>>,
    /// One-shot responses, consumed in order before the table is consulted
    scripted: Mutex<VecDeque<Vec<u8>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransportAdapter {
    pub fn new(config: &MockConfig) -> Self {
        Self {
            config: config.clone(),
            connected: AtomicBool::new(false),
            responses: RwLock::new(Self::default_responses()),
            scripted: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Add a mock response for a given request prefix; newer entries win
    pub fn add_response(&self, request: Vec<u8>, response: Vec<u8>) {
        self.responses.write().insert(0, (request, response));
    }

    /// Queue a one-shot response for the next send or receive
    pub fn queue_response(&self, response: Vec<u8>) {
        self.scripted.lock().push_back(response);
    }

    /// Every request sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    fn default_responses() -> Vec<(Vec<u8>, Vec<u8>)> {
        vec![
            // Diagnostic Session Control - Programming (0x10 85 -> 0x50 85)
            (vec![0x10, 0x85], vec![0x50, 0x85]),
            // Diagnostic Session Control - Default (0x10 81 -> 0x50 81)
            (vec![0x10, 0x81], vec![0x50, 0x81]),
            // Security Access - Request seed
            (vec![0x27, 0x01], vec![0x67, 0x01, 0x5C, 0x00, 0x00, 0x00]),
            // Security Access - Send key
            (vec![0x27, 0x02], vec![0x67, 0x02]),
            // Read ECU Identification
            (vec![0x1A, 0x9B], {
                let mut resp = vec![0x5A, 0x9B];
                resp.extend_from_slice(MOCK_IDENTIFICATION);
                resp
            }),
            // Read ECU Identification - flash status
            (vec![0x1A, 0x9C], vec![0x5A, 0x9C, 0x00, 0x00]),
            // Request Download -> max block length 254
            (vec![0x34], vec![0x74, 0x00, 0xFE]),
            // Start Routine - erase / checksum
            (vec![0x31, 0xC4], vec![0x71, 0xC4]),
            (vec![0x31, 0xC5], vec![0x71, 0xC5]),
            // Routine Results - success
            (vec![0x33, 0xC4], vec![0x73, 0xC4, 0x00]),
            (vec![0x33, 0xC5], vec![0x73, 0xC5, 0x00]),
            // Tester Present (0x3E 01 -> 0x7E)
            (vec![0x3E, 0x01], vec![0x7E]),
        ]
    }

    fn find_response(&self, request: &[u8]) -> Option<Vec<u8>> {
        if let Some(resp) = self.scripted.lock().pop_front() {
            return Some(resp);
        }

        let responses = self.responses.read();

        // First try exact match
        for (req, resp) in responses.iter() {
            if req == request {
                return Some(resp.clone());
            }
        }

        // Then try prefix match for variable-length requests
        for (req, resp) in responses.iter() {
            if request.starts_with(req) {
                return Some(resp.clone());
            }
        }

        // Positive response = service_id + 0x40
        request
            .first()
            .map(|service_id| vec![service_id.wrapping_add(0x40)])
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

#[async_trait]
impl TransportAdapter for MockTransportAdapter {
    async fn open(&self, bus: u8) -> Result<(), TransportError> {
        tracing::debug!(bus, "Mock transport: channel opened");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_receive(
        &self,
        request: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        self.simulate_latency().await;
        self.sent.lock().push(request.to_vec());

        self.find_response(request)
            .ok_or_else(|| TransportError::ReceiveFailed("No mock response configured".to_string()))
    }

    async fn receive(&self, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        self.simulate_latency().await;
        self.scripted
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Timeout("No scripted response queued".to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MockTransportAdapter {
        MockTransportAdapter::new(&MockConfig::default())
    }

    #[tokio::test]
    async fn closed_until_opened() {
        let mock = adapter();
        let err = mock
            .send_receive(&[0x3E, 0x01], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ConnectionClosed);

        mock.open(1).await.unwrap();
        assert!(mock.is_connected().await);
        let resp = mock
            .send_receive(&[0x3E, 0x01], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp, vec![0x7E]);
    }

    #[tokio::test]
    async fn prefix_and_default_responses() {
        let mock = adapter();
        mock.open(0).await.unwrap();

        let resp = mock
            .send_receive(&[0x34, 0x00, 0x02, 0xA4, 0x00, 0x00, 0x00, 0x1E], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(resp, vec![0x74, 0x00, 0xFE]);

        let resp = mock.send_receive(&[0x37], Duration::ZERO).await.unwrap();
        assert_eq!(resp, vec![0x77]);
    }

    #[tokio::test]
    async fn scripted_responses_win() {
        let mock = adapter();
        mock.open(0).await.unwrap();
        mock.queue_response(vec![0x7F, 0x36, 0x78]);
        mock.queue_response(vec![0x76]);

        let first = mock.send_receive(&[0x36, 0xAA], Duration::ZERO).await.unwrap();
        assert_eq!(first, vec![0x7F, 0x36, 0x78]);
        assert_eq!(mock.receive(Duration::ZERO).await.unwrap(), vec![0x76]);
        assert!(matches!(
            mock.receive(Duration::ZERO).await.unwrap_err(),
            TransportError::Timeout(_)
        ));
        assert_eq!(mock.sent(), vec![vec![0x36, 0xAA]]);
    }

    #[tokio::test]
    async fn added_response_overrides_default() {
        let mock = adapter();
        mock.open(0).await.unwrap();
        mock.add_response(vec![0x33, 0xC4], vec![0x73, 0xC4, 0x01]);

        let resp = mock.send_receive(&[0x33, 0xC4], Duration::ZERO).await.unwrap();
        assert_eq!(resp, vec![0x73, 0xC4, 0x01]);
    }
}
