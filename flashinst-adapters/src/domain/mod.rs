//! Domain layer - sector model and the storage port, free of flash drivers.
//!
//! ```text
//!     ┌──────────────────────────────────┐
//!     │      Domain Layer (Core)         │
//!     │  - SectorNumber (value object)   │
//!     │  - Sector, SectorState (entity)  │
//!     │  - SectorStorage (port)          │
//!     └────────────┬─────────────────────┘
//!                  ▲ implemented by
//!     ┌────────────┴─────────────────────┐
//!     │      Adapter Layer               │
//!     │  - NorFlashAdapter               │
//!     └──────────────────────────────────┘
//! ```
//!
//! Everything here works in units of [`SECTOR_SIZE`] bytes, the erase unit of
//! the NOR parts this crate targets.

pub mod ports;
pub mod sector;

use aligned::{A4, Aligned};

pub use ports::SectorStorage;
pub use sector::{Sector, SectorNumber, SectorState, SectorUpdate};

/// Size of one erase sector in bytes (4KB).
pub const SECTOR_SIZE: usize = 4096;

/// Sector-sized buffer with the 4-byte alignment most flash drivers require.
pub type SectorBuf = Aligned<A4, [u8; SECTOR_SIZE]>;

/// Create a sector buffer filled with the erased value (0xFF).
#[inline]
pub fn erased_sector() -> SectorBuf {
    Aligned([0xFF; SECTOR_SIZE])
}
