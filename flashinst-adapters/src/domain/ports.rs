//! SectorStorage port - secondary (driven) port for sector-level flash I/O.
//!
//! The streaming layer depends on this abstraction; [`NorFlashAdapter`]
//! implements it for any `embedded-storage` NOR flash.
//!
//! [`NorFlashAdapter`]: crate::adapters::NorFlashAdapter

use core::fmt;
use core::ops::Range;

use super::{SectorBuf, SectorNumber};

/// Port for sector-level NOR flash operations.
///
/// Unlike a block device, NOR flash cannot overwrite bytes: a write can only
/// clear bits, and setting them again requires erasing the whole sector. The
/// port exposes both operations so callers can avoid needless erases.
pub trait SectorStorage {
    /// The error type for storage operations.
    type Error: fmt::Debug + fmt::Display;

    /// Number of sectors in the region.
    fn sector_count(&self) -> u32;

    /// Read a whole sector.
    fn read_sector(&mut self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), Self::Error>;

    /// Program `range` of `data` into the sector without erasing.
    ///
    /// Every byte in the range must only clear bits relative to the stored
    /// contents. Implementations may widen the range to the device's write
    /// granularity; bytes outside `range` must then already hold the stored
    /// values in `data`.
    fn program(
        &mut self,
        sector: SectorNumber,
        data: &SectorBuf,
        range: Range<usize>,
    ) -> Result<(), Self::Error>;

    /// Erase the sector and write `data` to it.
    fn erase_and_write(&mut self, sector: SectorNumber, data: &SectorBuf) -> Result<(), Self::Error>;

    /// Flush anything buffered by the driver. The default is a no-op.
    fn sync(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Total size of the region in bytes.
    fn capacity(&self) -> u64 {
        u64::from(self.sector_count()) * super::SECTOR_SIZE as u64
    }
}

impl<T: SectorStorage + ?Sized> SectorStorage for &mut T {
    type Error = T::Error;

    fn sector_count(&self) -> u32 {
        T::sector_count(self)
    }

    fn read_sector(&mut self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), Self::Error> {
        T::read_sector(self, sector, buf)
    }

    fn program(
        &mut self,
        sector: SectorNumber,
        data: &SectorBuf,
        range: Range<usize>,
    ) -> Result<(), Self::Error> {
        T::program(self, sector, data, range)
    }

    fn erase_and_write(&mut self, sector: SectorNumber, data: &SectorBuf) -> Result<(), Self::Error> {
        T::erase_and_write(self, sector, data)
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        T::sync(self)
    }
}
