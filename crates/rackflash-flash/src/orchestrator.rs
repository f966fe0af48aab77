//! Flash state machine
//!
//! ```text
//! Disconnected ─▶ SessionEstablished ─▶ Reconnecting ─▶ Authenticated
//!                                                            │
//!      ┌─────────────────────────────────────────────────────┘
//!      ▼
//! Segment{i}: RequestDownload ─▶ Erase ─▶ [Reauthenticate] ─▶ Transfer
//!             ─▶ TransferExit ─▶ ChecksumVerify ─▶ SegmentDone{i}
//!      │                                                 │
//!      └──────────────── i + 1 < n ◀─────────────────────┤
//!                                                        ▼
//!                                          Completed ─▶ StopComms
//! ```
//!
//! One driver loop executes the action belonging to the current state and
//! moves to the next one. Any failure ends the run: the channel is released
//! locally and the error returned. Nothing already written is rolled back.

use std::fmt;

use rackflash_core::{checksum, compute_key, FirmwareImage, FlashSegment};
use tracing::{debug, info, warn};

use crate::chunk::ChunkPlan;
use crate::config::FlashConfig;
use crate::error::{FlashError, FlashResult, ProtocolError};
use crate::plan::FlashPlan;
use crate::provider::{DiagnosticSession, IdentificationKind, RoutineId, SessionKind};

/// Routine result meaning success
const ROUTINE_OK: &[u8] = &[0x00];

/// Sub-steps of programming one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStep {
    RequestDownload,
    Erase,
    Reauthenticate,
    Transfer,
    TransferExit,
    ChecksumVerify,
}

/// Where the orchestrator is in a flash run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Disconnected,
    SessionEstablished,
    Reconnecting,
    Authenticated,
    Segment { index: usize, step: SegmentStep },
    SegmentDone { index: usize },
    Completed,
    StopComms,
}

impl fmt::Display for FlashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashState::Segment { index, step } => write!(f, "Segment {} {:?}", index, step),
            FlashState::SegmentDone { index } => write!(f, "Segment {} done", index),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Progress notifications for observers such as a progress bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashEvent {
    /// Entered a new state
    State(FlashState),
    /// The transport came back after `attempts` tries
    Reconnected { attempts: u32 },
    /// One chunk of a segment was accepted
    ChunkSent {
        segment: usize,
        /// Bytes of this segment sent so far
        sent: usize,
        segment_len: usize,
    },
}

/// Summary of a completed flash run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashReport {
    pub segments_written: usize,
    pub bytes_written: usize,
    pub chunks_sent: usize,
    /// Transport reopen attempts across the whole run
    pub reconnect_attempts: u32,
    /// Hex-encoded identification record read after entering programming
    pub ecu_identification: String,
    /// Hex-encoded flash status record
    pub flash_status: String,
}

type Observer = Box<dyn FnMut(&FlashEvent) + Send>;

/// Drives one [`DiagnosticSession`] through a complete flash run
pub struct Orchestrator<S> {
    session: S,
    config: FlashConfig,
    state: FlashState,
    observer: Option<Observer>,
}

impl<S: DiagnosticSession> Orchestrator<S> {
    pub fn new(session: S, config: FlashConfig) -> Self {
        Self {
            session,
            config,
            state: FlashState::Disconnected,
            observer: None,
        }
    }

    /// Receive a [`FlashEvent`] for every transition and chunk
    pub fn with_observer(mut self, observer: impl FnMut(&FlashEvent) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Ask `confirm` first; if it declines, return [`FlashError::UserAbort`]
    /// without touching the bus.
    pub async fn run_confirmed<F>(
        &mut self,
        plan: &FlashPlan,
        image: &FirmwareImage,
        confirm: F,
    ) -> FlashResult<FlashReport>
    where
        F: FnOnce(&FlashPlan) -> bool,
    {
        if !confirm(plan) {
            info!("Flash declined at confirmation");
            return Err(FlashError::UserAbort);
        }
        self.run(plan, image).await
    }

    /// Execute `plan` with the segment bytes taken from `image`
    pub async fn run(&mut self, plan: &FlashPlan, image: &FirmwareImage) -> FlashResult<FlashReport> {
        self.config.validate()?;
        if plan.segments.is_empty() {
            return Err(FlashError::Config("Flash plan has no segments".to_string()));
        }
        for segment in &plan.segments {
            segment.validate(image.len())?;
        }

        info!(
            variant = %plan.variant,
            bus = plan.bus,
            segments = plan.segments.len(),
            bytes = plan.total_bytes,
            "Starting flash"
        );

        let mut report = FlashReport::default();
        self.transition(FlashState::Disconnected);

        while self.state != FlashState::StopComms {
            match self.step(plan, image, &mut report).await {
                Ok(next) => self.transition(next),
                Err(e) => {
                    warn!(state = %self.state, error = %e, "Flash aborted");
                    if let Err(release_err) = self.session.release().await {
                        debug!(error = %release_err, "Release after failure also failed");
                    }
                    return Err(e);
                }
            }
        }

        info!(
            segments = report.segments_written,
            bytes = report.bytes_written,
            "Flash completed"
        );
        Ok(report)
    }

    /// Perform the action of the current state and return the next state
    async fn step(
        &mut self,
        plan: &FlashPlan,
        image: &FirmwareImage,
        report: &mut FlashReport,
    ) -> FlashResult<FlashState> {
        match self.state {
            FlashState::Disconnected => {
                self.prepare(plan.bus).await?;
                self.session
                    .enter_session(SessionKind::Programming)
                    .await
                    .map_err(FlashError::diagnostic("enter programming session"))?;
                Ok(FlashState::SessionEstablished)
            }

            // The unit resets its transport when switching session
            FlashState::SessionEstablished => Ok(FlashState::Reconnecting),

            FlashState::Reconnecting => {
                self.reconnect(plan.bus, report).await?;
                self.identify(report).await?;
                self.authenticate().await?;
                Ok(FlashState::Authenticated)
            }

            FlashState::Authenticated => Ok(FlashState::Segment {
                index: 0,
                step: SegmentStep::RequestDownload,
            }),

            FlashState::Segment { index, step } => {
                let segment = plan.segments[index];
                let next = self.segment_step(plan, image, index, segment, step, report).await?;
                Ok(match next {
                    Some(step) => FlashState::Segment { index, step },
                    None => FlashState::SegmentDone { index },
                })
            }

            FlashState::SegmentDone { index } => {
                report.segments_written += 1;
                if index + 1 < plan.segments.len() {
                    Ok(FlashState::Segment {
                        index: index + 1,
                        step: SegmentStep::RequestDownload,
                    })
                } else {
                    Ok(FlashState::Completed)
                }
            }

            FlashState::Completed => {
                self.session
                    .stop_communication()
                    .await
                    .map_err(FlashError::diagnostic("stop communication"))?;
                self.session
                    .release()
                    .await
                    .map_err(FlashError::diagnostic("release"))?;
                Ok(FlashState::StopComms)
            }

            FlashState::StopComms => Ok(FlashState::StopComms),
        }
    }

    /// Run one step of segment `index`; `None` once the segment is verified
    async fn segment_step(
        &mut self,
        plan: &FlashPlan,
        image: &FirmwareImage,
        index: usize,
        segment: FlashSegment,
        step: SegmentStep,
        report: &mut FlashReport,
    ) -> FlashResult<Option<SegmentStep>> {
        match step {
            SegmentStep::RequestDownload => {
                let offered = self
                    .session
                    .request_download(segment.start, segment.len() as u32)
                    .await
                    .map_err(FlashError::diagnostic("request download"))?;
                debug!(segment = %segment, offered, "Download window open");

                if offered < self.config.chunk_size {
                    return Err(ProtocolError::ChunkSizeTooSmall {
                        segment,
                        offered,
                        required: self.config.chunk_size,
                    }
                    .into());
                }
                Ok(Some(SegmentStep::Erase))
            }

            SegmentStep::Erase => {
                let handle = self
                    .session
                    .start_erase(segment.start, segment.end)
                    .await
                    .map_err(FlashError::diagnostic("start erase"))?;
                debug!(segment = %segment, status = %hex::encode(&handle.status), "Erase started");

                // The unit drops the channel while erasing
                self.reconnect(plan.bus, report).await?;
                self.expect_routine_ok(RoutineId::EraseFlash, segment).await?;

                if segment.reauthenticate_after_erase {
                    Ok(Some(SegmentStep::Reauthenticate))
                } else {
                    Ok(Some(SegmentStep::Transfer))
                }
            }

            SegmentStep::Reauthenticate => {
                self.authenticate().await?;
                Ok(Some(SegmentStep::Transfer))
            }

            SegmentStep::Transfer => {
                let data = segment.slice(image.as_bytes())?;
                let chunks = ChunkPlan::new(data.len(), self.config.chunk_size);
                info!(
                    segment = %segment,
                    index,
                    of = plan.segments.len(),
                    chunks = chunks.count(),
                    "Transferring segment"
                );

                let mut sent = 0;
                for chunk in chunks.split(data) {
                    self.session
                        .transfer_data(chunk)
                        .await
                        .map_err(FlashError::diagnostic("transfer data"))?;
                    self.session
                        .keep_alive()
                        .await
                        .map_err(FlashError::diagnostic("keep alive"))?;

                    sent += chunk.len();
                    report.chunks_sent += 1;
                    self.emit(&FlashEvent::ChunkSent {
                        segment: index,
                        sent,
                        segment_len: data.len(),
                    });
                }
                report.bytes_written += sent;
                Ok(Some(SegmentStep::TransferExit))
            }

            SegmentStep::TransferExit => {
                self.session
                    .transfer_exit()
                    .await
                    .map_err(FlashError::diagnostic("transfer exit"))?;
                Ok(Some(SegmentStep::ChecksumVerify))
            }

            SegmentStep::ChecksumVerify => {
                let sum = checksum::sum16(segment.slice(image.as_bytes())?);
                self.session
                    .start_checksum(segment.start, segment.end, sum)
                    .await
                    .map_err(FlashError::diagnostic("start checksum"))?;
                self.expect_routine_ok(RoutineId::FlashChecksum, segment).await?;
                debug!(segment = %segment, checksum = %format!("0x{:04X}", sum), "Segment verified");
                Ok(None)
            }
        }
    }

    async fn prepare(&mut self, bus: u8) -> FlashResult<()> {
        self.session
            .set_permissive_output()
            .await
            .map_err(FlashError::diagnostic("set output mode"))?;
        self.session
            .clear_channel()
            .await
            .map_err(FlashError::diagnostic("clear channel"))?;

        info!(bus, "Connecting");
        self.session.open(bus).await.map_err(|source| {
            if source.is_transport() {
                FlashError::Transport {
                    attempts: 1,
                    source,
                }
            } else {
                FlashError::Diagnostic {
                    step: "connect",
                    source,
                }
            }
        })
    }

    async fn reconnect(&mut self, bus: u8, report: &mut FlashReport) -> FlashResult<()> {
        let attempts = self
            .config
            .retry_policy()
            .reopen(&mut self.session, bus)
            .await?;
        report.reconnect_attempts += attempts;
        self.emit(&FlashEvent::Reconnected { attempts });
        Ok(())
    }

    async fn identify(&mut self, report: &mut FlashReport) -> FlashResult<()> {
        let ident = self
            .session
            .read_identification(IdentificationKind::EcuIdentification)
            .await
            .map_err(FlashError::diagnostic("read identification"))?;
        let status = self
            .session
            .read_identification(IdentificationKind::FlashStatus)
            .await
            .map_err(FlashError::diagnostic("read flash status"))?;

        info!(
            identification = %String::from_utf8_lossy(&ident).trim(),
            flash_status = %hex::encode(&status),
            "Unit identified"
        );
        report.ecu_identification = hex::encode(ident);
        report.flash_status = hex::encode(status);
        Ok(())
    }

    /// One seed/key exchange
    async fn authenticate(&mut self) -> FlashResult<()> {
        let seed = self
            .session
            .request_seed()
            .await
            .map_err(FlashError::diagnostic("request seed"))?;
        let seed_bytes: [u8; 4] = seed
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::InvalidSeed(hex::encode(&seed)))?;

        let key = compute_key(u32::from_be_bytes(seed_bytes)).to_be_bytes();
        debug!(seed = %hex::encode(seed_bytes), key = %hex::encode(key), "Security access");

        self.session
            .send_key(&key)
            .await
            .map_err(FlashError::diagnostic("send key"))?;
        info!("Security access granted");
        Ok(())
    }

    async fn expect_routine_ok(&mut self, routine: RoutineId, segment: FlashSegment) -> FlashResult<()> {
        let result = self
            .session
            .routine_result(routine)
            .await
            .map_err(FlashError::diagnostic("routine result"))?;

        if result != ROUTINE_OK {
            return Err(ProtocolError::RoutineFailed {
                routine,
                segment,
                result: hex::encode(&result),
            }
            .into());
        }
        Ok(())
    }

    fn transition(&mut self, next: FlashState) {
        debug!(from = %self.state, to = %next, "Flash state");
        self.state = next;
        self.emit(&FlashEvent::State(next));
    }

    fn emit(&mut self, event: &FlashEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(event);
        }
    }
}
