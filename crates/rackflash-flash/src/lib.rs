//! rackflash-flash - flash orchestrator for EPS rack control units
//!
//! Drives a [`DiagnosticSession`] through the programming sequence: enter
//! programming, reconnect, authenticate, then per segment request download,
//! erase, transfer, exit and verify. The protocol encoding lives behind the
//! session trait, so the same orchestrator runs against real hardware and
//! against [`sim::SimulatedEcu`].
//!
//! # Example
//!
//! ```rust,no_run
//! use rackflash_core::{FirmwareImage, Registry, Variant};
//! use rackflash_flash::{sim::SimulatedEcu, FlashConfig, FlashPlan, Orchestrator};
//!
//! # async fn run() -> Result<(), rackflash_flash::FlashError> {
//! let profile = Registry::builtin().get(Variant::Sw3501);
//! let image = FirmwareImage::read("patched.bin".as_ref())?;
//! let plan = FlashPlan::new(profile, &image, 1)?;
//!
//! let mut orchestrator = Orchestrator::new(SimulatedEcu::new(profile.image_len), FlashConfig::default());
//! let report = orchestrator.run_confirmed(&plan, &image, |_| true).await?;
//! println!("wrote {} bytes", report.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod provider;
pub mod retry;
pub mod sim;

pub use chunk::ChunkPlan;
pub use config::{FlashConfig, CHUNK_SIZE};
pub use error::{FlashError, FlashResult, ProtocolError};
pub use orchestrator::{FlashEvent, FlashReport, FlashState, Orchestrator, SegmentStep};
pub use plan::FlashPlan;
pub use provider::{
    DiagnosticSession, IdentificationKind, ProviderError, ProviderResult, RoutineHandle, RoutineId,
    SessionKind,
};
pub use retry::RetryPolicy;
