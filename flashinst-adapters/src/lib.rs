//! NOR flash adapters with hexagonal architecture.
//!
//! This crate turns a region of any `embedded-storage` NOR flash into a
//! seekable byte stream a FAT filesystem can be mounted on.
//!
//! # Architecture
//!
//! ## Domain Layer (`domain`)
//! - **Value Objects**: `SectorNumber`
//! - **Entities**: `Sector` with `SectorState`
//! - **Ports**: `SectorStorage`
//!
//! ## Adapter Layer (`adapters`)
//! - **`NorFlashAdapter`**: implements `SectorStorage` for a flash region
//! - **`MemoryFlash`**: RAM-backed NOR flash (requires `std`)
//!
//! ## Infrastructure Layer (`infrastructure`)
//! - **`FlashStream`**: `std::io::{Read, Write, Seek}` over the port
//!   (requires `std`)
//!
//! # Quick Start
//!
//! ```ignore
//! use flashinst_adapters::{FlashStream, NorFlashAdapter, NorFlashConfig};
//!
//! let adapter = NorFlashAdapter::new(esp_flash, NorFlashConfig::default_4mb())?;
//! let stream = FlashStream::new(adapter);
//! let fs = fatfs::FileSystem::new(stream, fatfs::FsOptions::new())?;
//! ```
//!
//! # Features
//!
//! - `std` (default): `FlashStream` and `MemoryFlash`
//! - `log` (default): trace logging of erases

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

// Core layers
pub mod adapters;
pub mod domain;
pub mod infrastructure;

pub use domain::{SECTOR_SIZE, Sector, SectorBuf, SectorNumber, SectorState, SectorStorage};

pub use adapters::{
    AdapterError, FlashOp, NOR_FLASH_BLOCK_SIZE, NorFlashAdapter, NorFlashConfig, NorFlashError,
};

#[cfg(feature = "std")]
pub use adapters::{MemoryFlash, MemoryFlashError};

#[cfg(feature = "std")]
pub use infrastructure::{FlashStream, StreamError};

// Re-export embedded_storage for convenience
pub use embedded_storage;
