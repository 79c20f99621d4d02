//! RAM-backed NOR flash.
//!
//! Behaves like a real NOR part: erase sets bytes to 0xFF, programming can
//! only clear bits, and every access is checked for alignment and bounds with
//! the `embedded-storage` helpers. Used by tests and by the host tooling,
//! which loads partition images into it.

use embedded_storage::nor_flash::{
    self, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash, check_erase, check_read,
    check_write,
};

use crate::adapters::AdapterError;
use crate::domain::SECTOR_SIZE;

/// Error returned by [`MemoryFlash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFlashError {
    /// Misaligned or out of bounds access.
    Access(NorFlashErrorKind),
    /// The part is write protected.
    WriteProtected,
}

impl nor_flash::NorFlashError for MemoryFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::Access(kind) => *kind,
            Self::WriteProtected => NorFlashErrorKind::Other,
        }
    }
}

/// In-memory NOR flash with 4-byte writes and 4KB erase sectors.
#[derive(Debug, Clone)]
pub struct MemoryFlash {
    data: Vec<u8>,
    write_protected: bool,
    erase_count: usize,
    program_count: usize,
}

impl MemoryFlash {
    /// Create an erased part of `size` bytes.
    ///
    /// # Panics
    /// Panics if `size` is not a multiple of 4KB.
    pub fn new(size: usize) -> Self {
        assert!(size % SECTOR_SIZE == 0, "flash size must be a multiple of 4KB");
        Self::from_vec(vec![0xFF; size])
    }

    /// Load a raw flash image.
    pub fn from_image(image: Vec<u8>) -> Result<Self, AdapterError> {
        if image.len() % SECTOR_SIZE != 0 {
            return Err(AdapterError::ImageSize(image.len()));
        }
        Ok(Self::from_vec(image))
    }

    fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            write_protected: false,
            erase_count: 0,
            program_count: 0,
        }
    }

    /// Current contents of the part.
    pub fn image(&self) -> &[u8] {
        &self.data
    }

    /// Consume the part and return its contents.
    pub fn into_image(self) -> Vec<u8> {
        self.data
    }

    /// Reject all erase and program operations while set.
    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// Number of 4KB sectors erased so far.
    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    /// Number of program operations so far.
    pub fn program_count(&self) -> usize {
        self.program_count
    }

    /// Reset the operation counters.
    pub fn reset_counters(&mut self) {
        self.erase_count = 0;
        self.program_count = 0;
    }
}

impl ErrorType for MemoryFlash {
    type Error = MemoryFlashError;
}

impl ReadNorFlash for MemoryFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(&*self, offset, bytes.len()).map_err(MemoryFlashError::Access)?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MemoryFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.write_protected {
            return Err(MemoryFlashError::WriteProtected);
        }
        check_erase(&*self, from, to).map_err(MemoryFlashError::Access)?;
        self.data[from as usize..to as usize].fill(0xFF);
        self.erase_count += (to - from) as usize / SECTOR_SIZE;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.write_protected {
            return Err(MemoryFlashError::WriteProtected);
        }
        check_write(&*self, offset, bytes.len()).map_err(MemoryFlashError::Access)?;
        let start = offset as usize;
        for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        self.program_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = MemoryFlash::new(SECTOR_SIZE);
        flash.write(0, &[0x0F, 0xF0, 0xAA, 0x55]).unwrap();
        flash.write(0, &[0xFF, 0xFF, 0x0F, 0xFF]).unwrap();
        assert_eq!(&flash.image()[..4], &[0x0F, 0xF0, 0x0A, 0x55]);

        flash.erase(0, SECTOR_SIZE as u32).unwrap();
        assert!(flash.image().iter().all(|b| *b == 0xFF));
        assert_eq!(flash.erase_count(), 1);
        assert_eq!(flash.program_count(), 2);
    }

    #[test]
    fn test_alignment_checked() {
        let mut flash = MemoryFlash::new(SECTOR_SIZE);
        assert_eq!(
            flash.write(1, &[0; 4]),
            Err(MemoryFlashError::Access(NorFlashErrorKind::NotAligned))
        );
        assert_eq!(
            flash.erase(0, 100),
            Err(MemoryFlashError::Access(NorFlashErrorKind::NotAligned))
        );
        let mut buf = [0u8; 8];
        assert_eq!(
            flash.read(SECTOR_SIZE as u32 - 4, &mut buf),
            Err(MemoryFlashError::Access(NorFlashErrorKind::OutOfBounds))
        );
    }

    #[test]
    fn test_write_protect() {
        let mut flash = MemoryFlash::new(SECTOR_SIZE);
        flash.set_write_protected(true);
        assert_eq!(flash.write(0, &[0; 4]), Err(MemoryFlashError::WriteProtected));
        assert_eq!(flash.erase(0, SECTOR_SIZE as u32), Err(MemoryFlashError::WriteProtected));

        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn test_image_size_validated() {
        assert_eq!(MemoryFlash::from_image(vec![0; 100]).unwrap_err(), AdapterError::ImageSize(100));
        let flash = MemoryFlash::from_image(vec![0; 2 * SECTOR_SIZE]).unwrap();
        assert_eq!(flash.capacity(), 2 * SECTOR_SIZE);
        assert_eq!(flash.into_image().len(), 2 * SECTOR_SIZE);
    }
}
