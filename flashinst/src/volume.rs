//! Flash volume lifecycle: probe, format, mount, inspect, unmount.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use fatfs::{
    FatType, FileSystem, FormatVolumeOptions, FsOptions, ReadWriteSeek, TimeProvider,
    format_volume,
};
use flashinst_adapters::embedded_storage::nor_flash::NorFlash;
use flashinst_adapters::{AdapterError, FlashStream, NorFlashAdapter, NorFlashConfig};
use log::{debug, info, warn};

use crate::error::MountError;
use crate::time::default_time_provider;

/// Byte stream over a NOR flash region, ready to hold a volume.
pub type FlashDevice<F> = FlashStream<NorFlashAdapter<F>>;

/// Wraps the region `config` of `flash` in a [`FlashDevice`].
pub fn flash_device<F: NorFlash>(
    flash: F,
    config: NorFlashConfig,
) -> Result<FlashDevice<F>, AdapterError> {
    Ok(FlashStream::new(NorFlashAdapter::new(flash, config)?))
}

/// Options controlling how a volume is brought up.
#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    format_on_mount_failure: bool,
    volume_label: [u8; 11],
    time_provider: &'static dyn TimeProvider,
}

impl MountOptions {
    /// Formats on failure, labels new volumes `FLASHINST`, stamps entries
    /// with the default clock.
    pub fn new() -> Self {
        Self {
            format_on_mount_failure: true,
            volume_label: *b"FLASHINST  ",
            time_provider: default_time_provider(),
        }
    }

    /// Whether an unformatted or corrupt volume is formatted and mounted again.
    pub fn format_on_mount_failure(mut self, enabled: bool) -> Self {
        self.format_on_mount_failure = enabled;
        self
    }

    /// Label written when formatting. Upper-cased, truncated or space-padded
    /// to 11 bytes.
    pub fn volume_label(mut self, label: &str) -> Self {
        let mut buf = [b' '; 11];
        for (dst, src) in buf.iter_mut().zip(label.bytes().filter(u8::is_ascii)) {
            *dst = src.to_ascii_uppercase();
        }
        self.volume_label = buf;
        self
    }

    /// Source of timestamps for created and modified entries.
    pub fn time_provider(mut self, provider: &'static dyn TimeProvider) -> Self {
        self.time_provider = provider;
        self
    }

    /// Whether formatting on failure is enabled.
    pub fn formats_on_failure(&self) -> bool {
        self.format_on_mount_failure
    }

    fn fs_options(&self) -> FsOptions {
        FsOptions::new().time_provider(self.time_provider)
    }

    fn format_options(&self) -> FormatVolumeOptions {
        FormatVolumeOptions::new().volume_label(self.volume_label)
    }
}

impl Default for MountOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Usage summary of a mounted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    /// FAT variant chosen at format time.
    pub fat_type: FatType,
    /// Label from the boot sector, trimmed.
    pub label: String,
    /// Allocation unit in bytes.
    pub cluster_size: u32,
    /// Clusters available for file data.
    pub total_clusters: u32,
    /// Clusters not allocated.
    pub free_clusters: u32,
}

impl VolumeInfo {
    /// Free space in bytes.
    pub fn free_bytes(&self) -> u64 {
        u64::from(self.free_clusters) * u64::from(self.cluster_size)
    }

    /// Data area size in bytes.
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.total_clusters) * u64::from(self.cluster_size)
    }
}

impl fmt::Display for VolumeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} volume '{}': {} of {} bytes free ({} byte clusters)",
            self.fat_type,
            self.label,
            self.free_bytes(),
            self.total_bytes(),
            self.cluster_size
        )
    }
}

/// A directory entry as seen by [`FlashVolume::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Long file name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// File size in bytes, 0 for directories.
    pub len: u64,
}

/// A mounted FAT volume on a flash device.
pub struct FlashVolume<D: ReadWriteSeek> {
    fs: FileSystem<D>,
    formatted: bool,
}

impl<D: ReadWriteSeek> FlashVolume<D> {
    /// Mounts the volume on `device`.
    ///
    /// The device is probed first. A missing boot sector, or one describing
    /// more space than the device has, is formatted when
    /// [`MountOptions::format_on_mount_failure`] is set and reported as
    /// [`MountError::Unformatted`] otherwise. A valid volume is never
    /// reformatted.
    pub fn mount(mut device: D, options: &MountOptions) -> Result<Self, MountError> {
        let capacity = device_len(&mut device).map_err(MountError::Io)?;
        let mut formatted = false;

        if let Err(reason) = probe(&mut device, options, capacity) {
            if !options.format_on_mount_failure {
                return Err(MountError::Unformatted(reason));
            }
            warn!("No usable filesystem ({}), formatting {} bytes", reason, capacity);
            Self::format(&mut device, options)?;
            formatted = true;
        }

        device.seek(SeekFrom::Start(0)).map_err(MountError::Io)?;
        let fs = FileSystem::new(device, options.fs_options()).map_err(MountError::Io)?;
        debug!(
            "Mounted {:?} volume ({} bytes, formatted: {})",
            fs.fat_type(),
            capacity,
            formatted
        );
        Ok(Self { fs, formatted })
    }

    /// Writes a fresh, empty filesystem over the whole device.
    pub fn format(device: &mut D, options: &MountOptions) -> Result<(), MountError> {
        device.seek(SeekFrom::Start(0)).map_err(MountError::Io)?;
        format_volume(&mut *device, options.format_options()).map_err(MountError::Format)?;
        device.seek(SeekFrom::Start(0)).map_err(MountError::Io)?;
        info!("Formatted flash volume");
        Ok(())
    }

    /// Whether this mount had to format the device.
    pub fn was_formatted(&self) -> bool {
        self.formatted
    }

    /// The underlying filesystem.
    pub fn fs(&self) -> &FileSystem<D> {
        &self.fs
    }

    /// Reads a whole file.
    pub fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut file = self.fs.root_dir().open_file(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Size of a file in bytes.
    pub fn file_len(&self, path: &str) -> io::Result<u64> {
        let mut file = self.fs.root_dir().open_file(path)?;
        file.seek(SeekFrom::End(0))
    }

    /// Whether a file exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.fs.root_dir().open_file(path).is_ok()
    }

    /// Lists a directory. An empty path or `/` lists the root.
    pub fn list_dir(&self, path: &str) -> io::Result<Vec<EntryInfo>> {
        let root = self.fs.root_dir();
        let trimmed = path.trim_matches('/');
        let dir = if trimmed.is_empty() {
            root
        } else {
            root.open_dir(trimmed)?
        };

        let mut entries = Vec::new();
        for entry in dir.iter() {
            let entry = entry?;
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            entries.push(EntryInfo {
                is_dir: entry.is_dir(),
                len: if entry.is_dir() { 0 } else { entry.len() },
                name,
            });
        }
        Ok(entries)
    }

    /// Cluster usage, FAT type and label.
    pub fn stats(&self) -> io::Result<VolumeInfo> {
        let stats = self.fs.stats()?;
        Ok(VolumeInfo {
            fat_type: self.fs.fat_type(),
            label: self.fs.volume_label().trim_end().to_owned(),
            cluster_size: stats.cluster_size(),
            total_clusters: stats.total_clusters(),
            free_clusters: stats.free_clusters(),
        })
    }

    /// Flushes filesystem metadata and releases the device.
    pub fn unmount(self) -> Result<(), MountError> {
        self.fs.unmount().map_err(MountError::Io)?;
        debug!("Unmounted flash volume");
        Ok(())
    }
}

impl<D: ReadWriteSeek> fmt::Debug for FlashVolume<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlashVolume")
            .field("fat_type", &self.fs.fat_type())
            .field("formatted", &self.formatted)
            .finish_non_exhaustive()
    }
}

fn device_len<D: Seek>(device: &mut D) -> io::Result<u64> {
    let len = device.seek(SeekFrom::End(0))?;
    device.seek(SeekFrom::Start(0))?;
    Ok(len)
}

/// Checks for a filesystem that fits the device without keeping it mounted.
fn probe<D: ReadWriteSeek>(device: &mut D, options: &MountOptions, capacity: u64) -> io::Result<()> {
    device.seek(SeekFrom::Start(0))?;
    let fs = FileSystem::new(&mut *device, options.fs_options())?;
    let stats = fs.stats()?;
    let claimed = u64::from(stats.total_clusters()) * u64::from(stats.cluster_size());
    if claimed > capacity {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "filesystem claims {} bytes on a {} byte device",
                claimed, capacity
            ),
        ));
    }
    Ok(())
}
