//! Flash partition images on the host.
//!
//! An image is a raw dump of the flash region the firmware mounts. It is
//! loaded into a [`MemoryFlash`] so commands run the exact code path the
//! device runs, then written back if anything was programmed or erased.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flashinst::{FlashDevice, flash_device};
use flashinst_adapters::{MemoryFlash, NorFlashConfig, SECTOR_SIZE};

/// Largest image accepted: a whole 16MB part.
pub const MAX_PAGES: u32 = 4096;

/// A flash image loaded from (or destined for) a host file.
pub struct FlashImage {
    path: PathBuf,
    flash: MemoryFlash,
    created: bool,
}

impl FlashImage {
    /// Loads an existing image.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
        let flash = MemoryFlash::from_image(bytes)
            .with_context(|| format!("Invalid flash image {}", path.display()))?;
        log::debug!("Loaded {} ({} bytes)", path.display(), flash.image().len());
        Ok(Self {
            path: path.to_path_buf(),
            flash,
            created: false,
        })
    }

    /// An erased image of `pages` 4KB sectors, not yet on disk.
    pub fn create(path: &Path, pages: u32) -> Result<Self> {
        if pages == 0 {
            anyhow::bail!("An image needs at least one page");
        }
        if pages > MAX_PAGES {
            anyhow::bail!("{} pages exceed the {} page maximum", pages, MAX_PAGES);
        }
        Ok(Self {
            path: path.to_path_buf(),
            flash: MemoryFlash::new(pages as usize * SECTOR_SIZE),
            created: true,
        })
    }

    /// Loads `path`, or starts an erased image of `pages` sectors when it
    /// does not exist.
    pub fn open_or_create(path: &Path, pages: u32) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            log::info!("{} not found, starting from erased flash", path.display());
            Self::create(path, pages)
        }
    }

    /// Host file backing this image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Image size in bytes.
    pub fn len(&self) -> usize {
        self.flash.image().len()
    }

    /// Whether the image holds no sectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole image as a device a volume can be mounted on.
    pub fn device(&mut self) -> Result<FlashDevice<&mut MemoryFlash>> {
        let config = NorFlashConfig::whole(self.flash.image().len());
        flash_device(&mut self.flash, config).context("Flash image geometry")
    }

    /// Whether the image has never been written to disk.
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// Whether the host file is out of date.
    pub fn is_dirty(&self) -> bool {
        self.created || self.flash.erase_count() + self.flash.program_count() > 0
    }

    /// Writes the image back if it changed. Returns whether it was written.
    pub fn save(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            log::debug!("{} unchanged", self.path.display());
            return Ok(false);
        }
        fs::write(&self.path, self.flash.image())
            .with_context(|| format!("Failed to write image {}", self.path.display()))?;
        self.flash.reset_counters();
        self.created = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bounds_page_count() {
        let path = Path::new("flash.bin");
        assert!(FlashImage::create(path, 0).is_err());
        assert!(FlashImage::create(path, MAX_PAGES + 1).is_err());
        assert!(FlashImage::create(path, u32::MAX).is_err());

        let image = FlashImage::create(path, 4).unwrap();
        assert_eq!(image.len(), 4 * SECTOR_SIZE);
        assert!(image.is_new());
        assert!(image.is_dirty());
    }
}
