//! Adapter-level errors.

use core::fmt;

/// Errors raised while setting up an adapter, before any flash I/O happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The configured region extends past the end of the flash part.
    RegionOutOfBounds {
        /// First byte after the region.
        end: u64,
        /// Capacity of the flash part.
        capacity: u64,
    },
    /// A flash granularity does not divide the 4KB sector size.
    UnsupportedGeometry {
        /// Which granularity (read, write or erase).
        what: &'static str,
        /// The offending size in bytes.
        size: usize,
    },
    /// A flash image is not a whole number of sectors.
    ImageSize(usize),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionOutOfBounds { end, capacity } => write!(
                f,
                "Flash region ends at {:#x} but the part holds only {:#x} bytes",
                end, capacity
            ),
            Self::UnsupportedGeometry { what, size } => {
                write!(f, "Flash {} size {} does not divide the 4KB sector", what, size)
            }
            Self::ImageSize(len) => {
                write!(f, "Flash image of {} bytes is not a multiple of 4KB", len)
            }
        }
    }
}

impl core::error::Error for AdapterError {}
