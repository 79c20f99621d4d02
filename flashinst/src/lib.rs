//! Startup content installer for FAT volumes on NOR flash.
//!
//! At boot the firmware mounts its flash partition, formatting it when no
//! valid filesystem is found, and writes a build-time payload (the arcade
//! game script) to a fixed path. A failure is reported once and never stops
//! the device from booting.
//!
//! # Quick Start
//!
//! ```
//! use flashinst::{FlashVolume, MountOptions, flash_device, install_file};
//! use flashinst_adapters::{MemoryFlash, NorFlashConfig};
//!
//! let mut flash = MemoryFlash::new(512 * 1024);
//! let device = flash_device(&mut flash, NorFlashConfig::whole(512 * 1024)).unwrap();
//!
//! let volume = FlashVolume::mount(device, &MountOptions::new()).unwrap();
//! install_file(&volume, "/game.js", b"console.log('hi')").unwrap();
//! assert_eq!(volume.read_file("/game.js").unwrap(), b"console.log('hi')");
//! ```
//!
//! # Features
//!
//! - `chrono` (default): stamp entries with the local wall clock. Without it
//!   entries carry the FAT epoch unless a provider is configured.

#![warn(missing_docs)]

pub mod boot;
pub mod diagnostics;
pub mod error;
pub mod installer;
pub mod payload;
pub mod time;
pub mod volume;

pub use diagnostics::{DiagnosticSink, LogSink};
pub use error::{InstallError, InstallPhase, MountError};
pub use installer::{
    FlashContentInstaller, InstallOptions, InstallOutcome, InstallReport, Startup, install_file,
    install_file_with,
};
pub use payload::{DEFAULT_TARGET, GAME_JS, Payload};
pub use time::{DOS_EPOCH, FixedTimeProvider};
pub use volume::{
    EntryInfo, FlashDevice, FlashVolume, MountOptions, VolumeInfo, flash_device,
};

#[cfg(feature = "chrono")]
pub use time::ClockTimeProvider;

// Re-exported for callers implementing their own time providers
pub use fatfs;
