//! rackflash-core - firmware patching for EPS rack control units
//!
//! This crate holds everything that operates on a firmware image without
//! talking to the hardware:
//!
//! - [`checksum`]: CRC-16/XMODEM region checksums and the 16-bit additive sum
//!   used by the on-device checksum routine
//! - [`patch`] / [`patcher`]: patch tables and the all-or-nothing patcher
//! - [`keygen`]: the seed/key transform for programming security access
//! - [`variant`]: the registry of supported firmware variants
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌─────────────┐    ┌──────────────┐
//! │   Registry   │───▶│   Patcher   │───▶│ patched image│
//! │ (VariantProf)│    │             │    └──────────────┘
//! └──────────────┘    └──────┬──────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     │  checksum   │
//!                     │ (CRC-16)    │
//!                     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use rackflash_core::{patcher, Registry, Variant};
//!
//! let profile = Registry::builtin().get(Variant::Sw3501);
//! let report = patcher::patch_file("stock.bin".as_ref(), "patched.bin".as_ref(), profile)?;
//! println!("changed {} bytes", report.bytes_changed);
//! # Ok::<(), rackflash_core::PatchError>(())
//! ```

pub mod checksum;
pub mod error;
pub mod image;
pub mod keygen;
pub mod patch;
pub mod patcher;
pub mod segment;
pub mod table_file;
mod tables;
pub mod variant;

pub use checksum::{crc16, sum16, ChecksumMismatch};
pub use error::{ChecksumStage, PatchError, PatchResult};
pub use image::FirmwareImage;
pub use keygen::compute_key;
pub use patch::{ChecksumRegion, ExpectedValue, PatchOp, PatchTable};
pub use patcher::{PatchReport, Patcher};
pub use segment::FlashSegment;
pub use variant::{Registry, Variant, VariantProfile};
