//! Sector port implementation for `embedded-storage` NOR flash.
//!
//! The firmware keeps its volume in a partition at the end of the SPI flash
//! part. [`NorFlashConfig`] names that partition and [`NorFlashAdapter`]
//! maps [`SectorNumber`]s inside it to absolute flash offsets.
//!
//! ```ignore
//! use esp_storage::FlashStorage;
//! use flashinst_adapters::{FlashStream, NorFlashAdapter, NorFlashConfig};
//!
//! let adapter = NorFlashAdapter::new(FlashStorage::new(), NorFlashConfig::default_4mb())?;
//! let stream = FlashStream::new(adapter);
//! ```

use core::fmt;
use core::ops::Range;

use embedded_storage::nor_flash::{self, NorFlash, NorFlashErrorKind};

use crate::adapters::AdapterError;
use crate::domain::{SECTOR_SIZE, SectorBuf, SectorNumber, SectorStorage};

/// Erase unit the adapter works in.
pub const NOR_FLASH_BLOCK_SIZE: usize = SECTOR_SIZE;

/// Flash partition holding the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorFlashConfig {
    /// Absolute byte offset of the partition, sector aligned.
    pub start_offset: u32,
    /// Partition length in sectors.
    pub page_count: u32,
}

impl NorFlashConfig {
    /// Partition of `page_count` sectors at `start_offset`.
    ///
    /// # Panics
    ///
    /// If `start_offset` is not a multiple of 4KB.
    pub fn new(start_offset: u32, page_count: u32) -> Self {
        assert!(
            start_offset % NOR_FLASH_BLOCK_SIZE as u32 == 0,
            "partition offset must be 4KB aligned"
        );
        Self {
            start_offset,
            page_count,
        }
    }

    /// Partition spanning a whole part of `capacity` bytes.
    pub fn whole(capacity: usize) -> Self {
        Self::new(0, (capacity / NOR_FLASH_BLOCK_SIZE) as u32)
    }

    /// 256KB data partition at the top of a 4MB part (0x3C0000..0x400000).
    pub fn default_4mb() -> Self {
        Self::new(0x3C_0000, 64)
    }

    /// 1MB data partition at the top of a 16MB part (0xF00000..0x1000000).
    pub fn default_16mb() -> Self {
        Self::new(0xF0_0000, 256)
    }

    /// Partition length in bytes.
    #[inline]
    pub fn total_size(&self) -> u64 {
        u64::from(self.page_count) * NOR_FLASH_BLOCK_SIZE as u64
    }

    /// First byte after the partition.
    #[inline]
    pub fn end_offset(&self) -> u64 {
        u64::from(self.start_offset) + self.total_size()
    }
}

impl Default for NorFlashConfig {
    fn default() -> Self {
        Self::default_4mb()
    }
}

/// Flash operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// Reading a sector.
    Read,
    /// Programming bytes without erase.
    Program,
    /// Erasing a sector.
    Erase,
}

/// A driver error, tagged with the operation and where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorFlashError {
    /// Operation that failed.
    pub op: FlashOp,
    /// Generic error kind reported by the driver.
    pub kind: NorFlashErrorKind,
    /// Absolute flash offset of the operation.
    pub offset: u32,
}

impl NorFlashError {
    fn from_driver<E: nor_flash::NorFlashError>(op: FlashOp, offset: u32, err: E) -> Self {
        Self {
            op,
            kind: err.kind(),
            offset,
        }
    }
}

impl fmt::Display for NorFlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NOR flash {:?} failed at {:#x}: {}",
            self.op, self.offset, self.kind
        )
    }
}

impl core::error::Error for NorFlashError {}

/// [`SectorStorage`] over one partition of a NOR flash part.
///
/// `&mut F` works as the flash too, for callers that need the part back
/// after the adapter is gone.
pub struct NorFlashAdapter<F> {
    flash: F,
    region: NorFlashConfig,
}

impl<F: NorFlash> NorFlashAdapter<F> {
    /// Checks the part's geometry against `config` and wraps it.
    ///
    /// # Errors
    ///
    /// [`AdapterError::UnsupportedGeometry`] when a read, write or erase
    /// granularity does not divide 4KB, [`AdapterError::RegionOutOfBounds`]
    /// when the partition runs past the end of the part.
    pub fn new(flash: F, config: NorFlashConfig) -> Result<Self, AdapterError> {
        for (what, size) in [
            ("read", F::READ_SIZE),
            ("write", F::WRITE_SIZE),
            ("erase", F::ERASE_SIZE),
        ] {
            if size == 0 || NOR_FLASH_BLOCK_SIZE % size != 0 {
                return Err(AdapterError::UnsupportedGeometry { what, size });
            }
        }

        let capacity = flash.capacity() as u64;
        if config.end_offset() > capacity {
            return Err(AdapterError::RegionOutOfBounds {
                end: config.end_offset(),
                capacity,
            });
        }

        debug!(
            "NOR flash region {:#x}..{:#x} ({} sectors)",
            config.start_offset,
            config.end_offset(),
            config.page_count
        );
        Ok(Self {
            flash,
            region: config,
        })
    }
}

impl<F> NorFlashAdapter<F> {
    /// The partition in use.
    pub fn config(&self) -> &NorFlashConfig {
        &self.region
    }

    /// The flash part.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Releases the flash part.
    pub fn into_inner(self) -> F {
        self.flash
    }

    #[inline]
    fn absolute(&self, op: FlashOp, sector: SectorNumber) -> Result<u32, NorFlashError> {
        if sector.value() >= self.region.page_count {
            return Err(NorFlashError {
                op,
                kind: NorFlashErrorKind::OutOfBounds,
                offset: self.region.start_offset,
            });
        }
        Ok(self.region.start_offset + sector.byte_offset() as u32)
    }
}

impl<F: NorFlash> SectorStorage for NorFlashAdapter<F> {
    type Error = NorFlashError;

    fn sector_count(&self) -> u32 {
        self.region.page_count
    }

    fn read_sector(&mut self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), Self::Error> {
        let offset = self.absolute(FlashOp::Read, sector)?;
        self.flash
            .read(offset, &mut buf[..])
            .map_err(|e| NorFlashError::from_driver(FlashOp::Read, offset, e))
    }

    fn program(
        &mut self,
        sector: SectorNumber,
        data: &SectorBuf,
        range: Range<usize>,
    ) -> Result<(), Self::Error> {
        // Widen to the write granularity; the caller guarantees the extra
        // bytes already hold the stored values.
        let granule = F::WRITE_SIZE;
        let start = range.start / granule * granule;
        let end = range.end.div_ceil(granule) * granule;
        if start >= end {
            return Ok(());
        }

        let offset = self.absolute(FlashOp::Program, sector)? + start as u32;
        self.flash
            .write(offset, &data[start..end])
            .map_err(|e| NorFlashError::from_driver(FlashOp::Program, offset, e))
    }

    fn erase_and_write(&mut self, sector: SectorNumber, data: &SectorBuf) -> Result<(), Self::Error> {
        let offset = self.absolute(FlashOp::Erase, sector)?;
        trace!("erasing {} at {:#x}", sector, offset);

        self.flash
            .erase(offset, offset + NOR_FLASH_BLOCK_SIZE as u32)
            .map_err(|e| NorFlashError::from_driver(FlashOp::Erase, offset, e))?;

        self.flash
            .write(offset, &data[..])
            .map_err(|e| NorFlashError::from_driver(FlashOp::Program, offset, e))
    }
}
