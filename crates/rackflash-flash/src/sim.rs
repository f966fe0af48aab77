//! In-memory control unit for exercising the orchestrator
//!
//! Behaves like the real unit where the flow depends on it: the channel drops
//! on entering programming and while erasing, security access checks the key,
//! transfers land in simulated flash, and the checksum routine sums what was
//! actually written. Faults can be injected per instance.
//!
//! [`SimulatedEcu`] is a cheap handle; clones share the same unit so a test
//! can inspect it while the orchestrator owns another clone.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rackflash_core::{checksum, compute_key};

use crate::provider::{
    DiagnosticSession, IdentificationKind, ProviderError, ProviderResult, RoutineHandle, RoutineId,
    SessionKind,
};

/// Identification record served by default
pub const SIM_IDENTIFICATION: &[u8] = b"1K0909144R  APA EPS    3501";

/// Every call the unit received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    SetPermissiveOutput,
    ClearChannel,
    Open { bus: u8 },
    EnterSession(SessionKind),
    RequestSeed,
    SendKey(Vec<u8>),
    ReadIdentification(IdentificationKind),
    RequestDownload { address: u32, len: u32 },
    StartErase { start: u32, end: u32 },
    StartChecksum { start: u32, end: u32, checksum: u16 },
    RoutineResult(RoutineId),
    TransferData { len: usize },
    TransferExit,
    KeepAlive,
    StopCommunication,
    Release,
}

#[derive(Debug)]
struct DownloadWindow {
    address: usize,
    len: usize,
    written: usize,
}

#[derive(Debug)]
struct EcuState {
    memory: Vec<u8>,
    connected: bool,
    opened_once: bool,
    session: SessionKind,
    seed: [u8; 4],
    unlocked: bool,
    window: Option<DownloadWindow>,
    results: HashMap<RoutineId, Vec<u8>>,
    calls: Vec<SimCall>,

    max_block: usize,
    reopen_errors: VecDeque<ProviderError>,
    refuse_reconnect: bool,
    erase_result: Option<Vec<u8>>,
    checksum_result: Option<Vec<u8>>,
}

/// Simulated rack control unit
#[derive(Debug, Clone)]
pub struct SimulatedEcu {
    state: Arc<Mutex<EcuState>>,
}

impl SimulatedEcu {
    /// A unit with `memory_len` bytes of erased flash
    pub fn new(memory_len: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(EcuState {
                memory: vec![0xFF; memory_len],
                connected: false,
                opened_once: false,
                session: SessionKind::Default,
                seed: [0x5C, 0x00, 0x00, 0x00],
                unlocked: false,
                window: None,
                results: HashMap::new(),
                calls: Vec::new(),
                max_block: 254,
                reopen_errors: VecDeque::new(),
                refuse_reconnect: false,
                erase_result: None,
                checksum_result: None,
            })),
        }
    }

    /// Largest chunk offered on request download
    pub fn with_max_block(self, max_block: usize) -> Self {
        self.state.lock().max_block = max_block;
        self
    }

    pub fn with_seed(self, seed: [u8; 4]) -> Self {
        self.state.lock().seed = seed;
        self
    }

    /// Fail the next `count` reopen attempts (the first open always works)
    pub fn with_reopen_failures(self, count: u32) -> Self {
        let error = ProviderError::Transport("no answer to channel setup".to_string());
        self.state
            .lock()
            .reopen_errors
            .extend(std::iter::repeat(error).take(count as usize));
        self
    }

    /// Fail the next reopen attempt with `error`, after any already queued
    pub fn with_reopen_error(self, error: ProviderError) -> Self {
        self.state.lock().reopen_errors.push_back(error);
        self
    }

    /// Never come back after the first channel drop
    pub fn refusing_reconnect(self) -> Self {
        self.state.lock().refuse_reconnect = true;
        self
    }

    /// Report `result` for every erase
    pub fn with_erase_result(self, result: Vec<u8>) -> Self {
        self.state.lock().erase_result = Some(result);
        self
    }

    /// Report `result` for every checksum check, whatever was written
    pub fn with_checksum_result(self, result: Vec<u8>) -> Self {
        self.state.lock().checksum_result = Some(result);
        self
    }

    /// Snapshot of the simulated flash
    pub fn memory(&self) -> Vec<u8> {
        self.state.lock().memory.clone()
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    /// Number of logged calls matching `pred`
    pub fn count(&self, pred: impl Fn(&SimCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn with_state<T>(
        &self,
        call: SimCall,
        f: impl FnOnce(&mut EcuState) -> ProviderResult<T>,
    ) -> ProviderResult<T> {
        let mut state = self.state.lock();
        state.calls.push(call);
        f(&mut state)
    }
}

impl EcuState {
    fn require_connected(&self) -> ProviderResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ProviderError::Transport("channel closed".to_string()))
        }
    }

    fn require_unlocked(&self, service: u8) -> ProviderResult<()> {
        self.require_connected()?;
        if self.unlocked {
            Ok(())
        } else {
            Err(rejected(service, 0x33, "security access denied"))
        }
    }

    /// Drop the channel the way the unit does after a reset
    fn drop_channel(&mut self) {
        self.connected = false;
        self.window = None;
    }
}

fn rejected(service: u8, code: u8, reason: &str) -> ProviderError {
    ProviderError::Rejected {
        service,
        code,
        reason: reason.to_string(),
    }
}

fn inclusive(start: u32, end: u32, memory_len: usize) -> ProviderResult<std::ops::RangeInclusive<usize>> {
    let (start, end) = (start as usize, end as usize);
    if start > end || end >= memory_len {
        return Err(rejected(0x31, 0x31, "request out of range"));
    }
    Ok(start..=end)
}

#[async_trait]
impl DiagnosticSession for SimulatedEcu {
    async fn set_permissive_output(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::SetPermissiveOutput, |_| Ok(()))
    }

    async fn clear_channel(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::ClearChannel, |_| Ok(()))
    }

    async fn open(&mut self, bus: u8) -> ProviderResult<()> {
        self.with_state(SimCall::Open { bus }, |s| {
            if s.opened_once {
                if s.refuse_reconnect {
                    return Err(ProviderError::Transport("no answer to channel setup".to_string()));
                }
                if let Some(error) = s.reopen_errors.pop_front() {
                    return Err(error);
                }
            }
            s.connected = true;
            s.opened_once = true;
            Ok(())
        })
    }

    async fn enter_session(&mut self, kind: SessionKind) -> ProviderResult<()> {
        self.with_state(SimCall::EnterSession(kind), |s| {
            s.require_connected()?;
            s.session = kind;
            s.unlocked = false;
            if kind == SessionKind::Programming {
                s.drop_channel();
            }
            Ok(())
        })
    }

    async fn request_seed(&mut self) -> ProviderResult<Vec<u8>> {
        self.with_state(SimCall::RequestSeed, |s| {
            s.require_connected()?;
            if s.session != SessionKind::Programming {
                return Err(rejected(0x27, 0x22, "conditions not correct"));
            }
            Ok(s.seed.to_vec())
        })
    }

    async fn send_key(&mut self, key: &[u8]) -> ProviderResult<()> {
        self.with_state(SimCall::SendKey(key.to_vec()), |s| {
            s.require_connected()?;
            let expected = compute_key(u32::from_be_bytes(s.seed)).to_be_bytes();
            if key != expected.as_slice() {
                return Err(rejected(0x27, 0x35, "invalid key"));
            }
            s.unlocked = true;
            Ok(())
        })
    }

    async fn read_identification(&mut self, kind: IdentificationKind) -> ProviderResult<Vec<u8>> {
        self.with_state(SimCall::ReadIdentification(kind), |s| {
            s.require_connected()?;
            Ok(match kind {
                IdentificationKind::EcuIdentification => SIM_IDENTIFICATION.to_vec(),
                IdentificationKind::FlashStatus => vec![0x00, 0x00, 0x01, 0x00],
            })
        })
    }

    async fn request_download(&mut self, address: u32, len: u32) -> ProviderResult<usize> {
        self.with_state(SimCall::RequestDownload { address, len }, |s| {
            s.require_unlocked(0x34)?;
            let end = (address as usize + len as usize).saturating_sub(1);
            inclusive(address, end as u32, s.memory.len())?;
            s.window = Some(DownloadWindow {
                address: address as usize,
                len: len as usize,
                written: 0,
            });
            Ok(s.max_block)
        })
    }

    async fn start_erase(&mut self, start: u32, end: u32) -> ProviderResult<RoutineHandle> {
        self.with_state(SimCall::StartErase { start, end }, |s| {
            s.require_unlocked(0x31)?;
            let range = inclusive(start, end, s.memory.len())?;
            s.memory[range].fill(0xFF);

            let result = s.erase_result.clone().unwrap_or_else(|| vec![0x00]);
            s.results.insert(RoutineId::EraseFlash, result);

            // Erasing takes the unit off the bus, but the download window stays
            s.connected = false;
            Ok(RoutineHandle {
                routine: RoutineId::EraseFlash,
                status: Vec::new(),
            })
        })
    }

    async fn start_checksum(
        &mut self,
        start: u32,
        end: u32,
        checksum: u16,
    ) -> ProviderResult<RoutineHandle> {
        self.with_state(SimCall::StartChecksum { start, end, checksum }, |s| {
            s.require_unlocked(0x31)?;
            let range = inclusive(start, end, s.memory.len())?;
            let computed = checksum::sum16(&s.memory[range]);

            let result = match s.checksum_result {
                Some(ref forced) => forced.clone(),
                None if computed == checksum => vec![0x00],
                None => vec![0x01],
            };
            s.results.insert(RoutineId::FlashChecksum, result);
            Ok(RoutineHandle {
                routine: RoutineId::FlashChecksum,
                status: Vec::new(),
            })
        })
    }

    async fn routine_result(&mut self, routine: RoutineId) -> ProviderResult<Vec<u8>> {
        self.with_state(SimCall::RoutineResult(routine), |s| {
            s.require_connected()?;
            s.results
                .remove(&routine)
                .ok_or_else(|| rejected(0x33, 0x24, "request sequence error"))
        })
    }

    async fn transfer_data(&mut self, chunk: &[u8]) -> ProviderResult<()> {
        self.with_state(SimCall::TransferData { len: chunk.len() }, |s| {
            s.require_unlocked(0x36)?;
            if chunk.len() > s.max_block {
                return Err(rejected(0x36, 0x31, "block too long"));
            }
            let window = s
                .window
                .as_mut()
                .ok_or_else(|| rejected(0x36, 0x24, "request sequence error"))?;
            if window.written + chunk.len() > window.len {
                return Err(rejected(0x36, 0x71, "transfer suspended"));
            }

            let offset = window.address + window.written;
            window.written += chunk.len();
            s.memory[offset..offset + chunk.len()].copy_from_slice(chunk);
            Ok(())
        })
    }

    async fn transfer_exit(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::TransferExit, |s| {
            s.require_connected()?;
            match s.window.take() {
                Some(window) if window.written == window.len => Ok(()),
                _ => Err(rejected(0x37, 0x24, "request sequence error")),
            }
        })
    }

    async fn keep_alive(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::KeepAlive, |s| s.require_connected())
    }

    async fn stop_communication(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::StopCommunication, |s| {
            s.require_connected()?;
            s.session = SessionKind::Default;
            s.unlocked = false;
            Ok(())
        })
    }

    async fn release(&mut self) -> ProviderResult<()> {
        self.with_state(SimCall::Release, |s| {
            s.drop_channel();
            Ok(())
        })
    }
}
