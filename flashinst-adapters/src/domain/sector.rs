//! Sector value object and cached sector entity.

use core::fmt;

use super::{SECTOR_SIZE, SectorBuf, erased_sector};

/// Index of a 4KB erase sector inside the configured flash region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorNumber(u32);

impl SectorNumber {
    /// Create a new sector number.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the underlying u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Sector containing the given byte position of the region.
    #[inline]
    pub const fn containing(position: u64) -> Self {
        Self((position / SECTOR_SIZE as u64) as u32)
    }

    /// Byte position of the first byte of this sector, relative to the region.
    #[inline]
    pub const fn byte_offset(self) -> u64 {
        self.0 as u64 * SECTOR_SIZE as u64
    }
}

impl fmt::Display for SectorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sector({})", self.0)
    }
}

impl From<u32> for SectorNumber {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// The state of a cached sector.
///
/// - Clean: cached bytes match the flash
/// - Stale: a program or erase failed part way, the flash contents are unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectorState {
    /// Cached data is synchronized with flash.
    #[default]
    Clean,
    /// Cached data can no longer be trusted and must be reloaded.
    Stale,
}

impl SectorState {
    /// Check if the cached data can be served.
    #[inline]
    pub const fn is_clean(&self) -> bool {
        matches!(self, SectorState::Clean)
    }
}

/// How an update to a sector has to be committed to NOR flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorUpdate {
    /// New bytes equal the stored ones.
    Unchanged,
    /// New bytes only clear bits, they can be programmed in place.
    Program,
    /// At least one bit goes from 0 to 1, the sector must be erased first.
    EraseAndWrite,
}

/// A sector loaded from flash.
pub struct Sector {
    number: SectorNumber,
    data: SectorBuf,
    state: SectorState,
}

impl Sector {
    /// Create a clean sector from data just read from flash.
    pub fn new(number: SectorNumber, data: SectorBuf) -> Self {
        Self {
            number,
            data,
            state: SectorState::Clean,
        }
    }

    /// Create a clean sector holding erased flash.
    pub fn erased(number: SectorNumber) -> Self {
        Self::new(number, erased_sector())
    }

    /// Get the sector number.
    #[inline]
    pub const fn number(&self) -> SectorNumber {
        self.number
    }

    /// Get the sector state.
    #[inline]
    pub const fn state(&self) -> SectorState {
        self.state
    }

    /// Get the cached bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Get the cached bytes as an aligned buffer.
    #[inline]
    pub fn buf(&self) -> &SectorBuf {
        &self.data
    }

    /// Mark the cached copy as untrustworthy.
    pub fn mark_stale(&mut self) {
        self.state = SectorState::Stale;
    }

    /// Classify what writing `bytes` at `offset` would take.
    ///
    /// # Panics
    ///
    /// Panics if the range does not fit inside the sector.
    pub fn classify(&self, offset: usize, bytes: &[u8]) -> SectorUpdate {
        assert!(offset + bytes.len() <= SECTOR_SIZE, "update exceeds sector");
        let current = &self.data[offset..offset + bytes.len()];
        if current == bytes {
            SectorUpdate::Unchanged
        } else if current.iter().zip(bytes).all(|(old, new)| old & new == *new) {
            SectorUpdate::Program
        } else {
            SectorUpdate::EraseAndWrite
        }
    }

    /// Build the sector image that results from writing `bytes` at `offset`.
    pub fn patched(&self, offset: usize, bytes: &[u8]) -> SectorBuf {
        let mut image = self.data;
        image[offset..offset + bytes.len()].copy_from_slice(bytes);
        image
    }

    /// Replace the cached bytes after a successful commit.
    pub fn replace(&mut self, data: SectorBuf) {
        self.data = data;
        self.state = SectorState::Clean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_number_positions() {
        assert_eq!(SectorNumber::containing(0), SectorNumber::new(0));
        assert_eq!(SectorNumber::containing(4095), SectorNumber::new(0));
        assert_eq!(SectorNumber::containing(4096), SectorNumber::new(1));
        assert_eq!(SectorNumber::new(3).byte_offset(), 3 * 4096);
        assert_eq!(format!("{}", SectorNumber::new(7)), "Sector(7)");
    }

    #[test]
    fn test_classify_update() {
        let sector = Sector::erased(SectorNumber::new(0));
        assert_eq!(sector.classify(0, &[0xFF, 0xFF]), SectorUpdate::Unchanged);
        assert_eq!(sector.classify(10, b"abc"), SectorUpdate::Program);

        let mut sector = sector;
        let image = sector.patched(10, &[0x0F]);
        sector.replace(image);
        // 0x0F -> 0x07 only clears a bit
        assert_eq!(sector.classify(10, &[0x07]), SectorUpdate::Program);
        // 0x0F -> 0xF0 sets bits
        assert_eq!(sector.classify(10, &[0xF0]), SectorUpdate::EraseAndWrite);
    }

    #[test]
    fn test_stale_state() {
        let mut sector = Sector::erased(SectorNumber::new(2));
        assert!(sector.state().is_clean());
        sector.mark_stale();
        assert_eq!(sector.state(), SectorState::Stale);
        sector.replace(erased_sector());
        assert!(sector.state().is_clean());
    }
}
