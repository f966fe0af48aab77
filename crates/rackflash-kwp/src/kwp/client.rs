//! KWP2000 client for diagnostic communication

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rackflash_flash::{
    DiagnosticSession, IdentificationKind, ProviderError, ProviderResult, RoutineHandle, RoutineId,
    SessionKind,
};

use super::{
    access_type, identification_option, routine_local_id, service_id, session_type, KwpError,
    NegativeResponseCode, DATA_FORMAT_RAW, TESTER_PRESENT_RESPONSE_REQUIRED,
};
use crate::transport::TransportAdapter;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
const RESPONSE_PENDING_TIMEOUT: Duration = Duration::from_millis(30000);

/// KWP2000 client on top of a transport adapter
#[derive(Clone)]
pub struct Kwp2000Client {
    transport: Arc<dyn TransportAdapter>,
    timeout: Duration,
}

impl Kwp2000Client {
    pub fn new(transport: Arc<dyn TransportAdapter>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request and return the positive response.
    ///
    /// Response-pending answers are followed by waiting for the final answer
    /// without resending the request.
    async fn send_request(&self, request: &[u8]) -> Result<Vec<u8>, KwpError> {
        let sid = *request
            .first()
            .ok_or_else(|| KwpError::InvalidResponse("Empty request".to_string()))?;
        let start = Instant::now();

        let mut response = self.transport.send_receive(request, self.timeout).await?;

        loop {
            if response.first() == Some(&service_id::NEGATIVE_RESPONSE) {
                if response.len() < 3 {
                    return Err(KwpError::InvalidResponse(
                        "Negative response too short".to_string(),
                    ));
                }

                let service_id = response[1];
                let nrc = NegativeResponseCode::from(response[2]);

                if nrc == NegativeResponseCode::ResponsePending {
                    if start.elapsed() > RESPONSE_PENDING_TIMEOUT {
                        return Err(KwpError::Timeout);
                    }
                    tracing::debug!(service = %format!("0x{:02X}", sid), "Response pending");
                    response = self.transport.receive(self.timeout).await?;
                    continue;
                }

                return Err(KwpError::NegativeResponse { service_id, nrc });
            }

            let expected = sid.wrapping_add(service_id::POSITIVE_RESPONSE_OFFSET);
            if response.first() != Some(&expected) {
                return Err(KwpError::InvalidResponse(format!(
                    "Expected 0x{:02X}, got {}",
                    expected,
                    hex::encode(&response)
                )));
            }

            return Ok(response);
        }
    }

    /// Diagnostic Session Control (0x10)
    pub async fn diagnostic_session_control(&self, session: u8) -> Result<(), KwpError> {
        self.send_request(&[service_id::DIAGNOSTIC_SESSION_CONTROL, session])
            .await?;
        Ok(())
    }

    /// Security Access (0x27); returns the data following the access type
    pub async fn security_access(&self, access: u8, data: &[u8]) -> Result<Vec<u8>, KwpError> {
        let mut request = vec![service_id::SECURITY_ACCESS, access];
        request.extend_from_slice(data);

        let response = self.send_request(&request).await?;
        // Response: 0x67 [access] [data...]
        if response.len() < 2 {
            return Err(KwpError::InvalidResponse(
                "Security access response too short".to_string(),
            ));
        }
        Ok(response[2..].to_vec())
    }

    /// Read ECU Identification (0x1A)
    pub async fn read_ecu_identification(&self, option: u8) -> Result<Vec<u8>, KwpError> {
        let response = self
            .send_request(&[service_id::READ_ECU_IDENTIFICATION, option])
            .await?;
        if response.len() < 2 || response[1] != option {
            return Err(KwpError::InvalidResponse(format!(
                "Identification response for option 0x{:02X} malformed: {}",
                option,
                hex::encode(&response)
            )));
        }
        Ok(response[2..].to_vec())
    }

    /// Request Download (0x34); returns the maximum block length
    pub async fn request_download(&self, address: u32, size: u32) -> Result<usize, KwpError> {
        let mut request = vec![service_id::REQUEST_DOWNLOAD];
        request.extend_from_slice(&u24(address)?);
        request.push(DATA_FORMAT_RAW);
        request.extend_from_slice(&u24(size)?);

        let response = self.send_request(&request).await?;
        // Response: 0x74 [max block length (2 bytes)]
        match response.get(1..3) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo]) as usize),
            _ => Err(KwpError::InvalidResponse(format!(
                "Request download response too short: {}",
                hex::encode(&response)
            ))),
        }
    }

    /// Start Routine By Local Identifier (0x31)
    pub async fn start_routine(&self, routine: u8, params: &[u8]) -> Result<Vec<u8>, KwpError> {
        let mut request = vec![service_id::START_ROUTINE_BY_LOCAL_ID, routine];
        request.extend_from_slice(params);

        let response = self.send_request(&request).await?;
        Ok(response.get(2..).map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Request Routine Results By Local Identifier (0x33)
    pub async fn routine_results(&self, routine: u8) -> Result<Vec<u8>, KwpError> {
        let response = self
            .send_request(&[service_id::REQUEST_ROUTINE_RESULTS_BY_LOCAL_ID, routine])
            .await?;
        if response.len() < 2 || response[1] != routine {
            return Err(KwpError::InvalidResponse(format!(
                "Routine result for 0x{:02X} malformed: {}",
                routine,
                hex::encode(&response)
            )));
        }
        Ok(response[2..].to_vec())
    }

    /// Transfer Data (0x36)
    pub async fn transfer_data(&self, data: &[u8]) -> Result<(), KwpError> {
        let mut request = Vec::with_capacity(data.len() + 1);
        request.push(service_id::TRANSFER_DATA);
        request.extend_from_slice(data);

        self.send_request(&request).await?;
        Ok(())
    }

    /// Request Transfer Exit (0x37)
    pub async fn request_transfer_exit(&self) -> Result<(), KwpError> {
        self.send_request(&[service_id::REQUEST_TRANSFER_EXIT]).await?;
        Ok(())
    }

    /// Tester Present (0x3E)
    pub async fn tester_present(&self) -> Result<(), KwpError> {
        self.send_request(&[service_id::TESTER_PRESENT, TESTER_PRESENT_RESPONSE_REQUIRED])
            .await?;
        Ok(())
    }

    /// Stop Communication (0x82)
    pub async fn stop_communication(&self) -> Result<(), KwpError> {
        self.send_request(&[service_id::STOP_COMMUNICATION]).await?;
        Ok(())
    }
}

/// Encode an address or size as the 3 big-endian bytes KWP2000 expects
fn u24(value: u32) -> Result<[u8; 3], KwpError> {
    if value > 0x00FF_FFFF {
        return Err(KwpError::InvalidResponse(format!(
            "Value 0x{:X} does not fit in 24 bits",
            value
        )));
    }
    let [_, a, b, c] = value.to_be_bytes();
    Ok([a, b, c])
}

fn range_params(start: u32, end: u32) -> Result<Vec<u8>, KwpError> {
    let mut params = Vec::with_capacity(8);
    params.extend_from_slice(&u24(start)?);
    params.extend_from_slice(&u24(end)?);
    Ok(params)
}

#[async_trait]
impl DiagnosticSession for Kwp2000Client {
    async fn set_permissive_output(&mut self) -> ProviderResult<()> {
        self.transport
            .set_permissive_output()
            .await
            .map_err(|e| ProviderError::from(KwpError::from(e)))
    }

    async fn clear_channel(&mut self) -> ProviderResult<()> {
        self.transport
            .clear()
            .await
            .map_err(|e| ProviderError::from(KwpError::from(e)))
    }

    async fn open(&mut self, bus: u8) -> ProviderResult<()> {
        self.transport
            .open(bus)
            .await
            .map_err(|e| ProviderError::from(KwpError::from(e)))
    }

    async fn enter_session(&mut self, kind: SessionKind) -> ProviderResult<()> {
        let session = match kind {
            SessionKind::Default => session_type::DEFAULT,
            SessionKind::Programming => session_type::PROGRAMMING,
        };
        Ok(self.diagnostic_session_control(session).await?)
    }

    async fn request_seed(&mut self) -> ProviderResult<Vec<u8>> {
        Ok(self
            .security_access(access_type::PROGRAMMING_REQUEST_SEED, &[])
            .await?)
    }

    async fn send_key(&mut self, key: &[u8]) -> ProviderResult<()> {
        self.security_access(access_type::PROGRAMMING_SEND_KEY, key)
            .await?;
        Ok(())
    }

    async fn read_identification(&mut self, kind: IdentificationKind) -> ProviderResult<Vec<u8>> {
        let option = match kind {
            IdentificationKind::EcuIdentification => identification_option::ECU_IDENT,
            IdentificationKind::FlashStatus => identification_option::STATUS_FLASH,
        };
        Ok(self.read_ecu_identification(option).await?)
    }

    async fn request_download(&mut self, address: u32, len: u32) -> ProviderResult<usize> {
        Ok(Kwp2000Client::request_download(self, address, len).await?)
    }

    async fn start_erase(&mut self, start: u32, end: u32) -> ProviderResult<RoutineHandle> {
        let status = self
            .start_routine(routine_local_id::ERASE_FLASH, &range_params(start, end)?)
            .await?;
        Ok(RoutineHandle {
            routine: RoutineId::EraseFlash,
            status,
        })
    }

    async fn start_checksum(
        &mut self,
        start: u32,
        end: u32,
        checksum: u16,
    ) -> ProviderResult<RoutineHandle> {
        let mut params = range_params(start, end)?;
        params.extend_from_slice(&checksum.to_be_bytes());

        let status = self
            .start_routine(routine_local_id::CALCULATE_FLASH_CHECKSUM, &params)
            .await?;
        Ok(RoutineHandle {
            routine: RoutineId::FlashChecksum,
            status,
        })
    }

    async fn routine_result(&mut self, routine: RoutineId) -> ProviderResult<Vec<u8>> {
        let id = match routine {
            RoutineId::EraseFlash => routine_local_id::ERASE_FLASH,
            RoutineId::FlashChecksum => routine_local_id::CALCULATE_FLASH_CHECKSUM,
        };
        Ok(self.routine_results(id).await?)
    }

    async fn transfer_data(&mut self, chunk: &[u8]) -> ProviderResult<()> {
        Ok(Kwp2000Client::transfer_data(self, chunk).await?)
    }

    async fn transfer_exit(&mut self) -> ProviderResult<()> {
        Ok(self.request_transfer_exit().await?)
    }

    async fn keep_alive(&mut self) -> ProviderResult<()> {
        Ok(self.tester_present().await?)
    }

    async fn stop_communication(&mut self) -> ProviderResult<()> {
        Ok(Kwp2000Client::stop_communication(self).await?)
    }

    async fn release(&mut self) -> ProviderResult<()> {
        self.transport
            .close()
            .await
            .map_err(|e| ProviderError::from(KwpError::from(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_u24() {
        assert_eq!(u24(0x05_FFFF).unwrap(), [0x05, 0xFF, 0xFF]);
        assert_eq!(u24(676).unwrap(), [0x00, 0x02, 0xA4]);
        assert!(u24(0x0100_0000).is_err());
    }

    #[test]
    fn range_params_layout() {
        assert_eq!(
            range_params(0xA000, 0x5FFFF).unwrap(),
            vec![0x00, 0xA0, 0x00, 0x05, 0xFF, 0xFF]
        );
    }
}
