//! Seekable byte stream over a NOR flash region.
//!
//! `FlashStream` implements `std::io::{Read, Write, Seek}` on top of any
//! [`SectorStorage`], so a filesystem that expects a disk image can live on
//! flash directly. One sector is cached for reads. Writes are committed to
//! flash before `write` returns:
//!
//! - bytes identical to the stored ones are skipped
//! - updates that only clear bits are programmed in place
//! - everything else erases the sector and writes the merged image back

use std::fmt;
use std::io::{self, SeekFrom};

use crate::domain::{
    SECTOR_SIZE, Sector, SectorNumber, SectorStorage, SectorUpdate, erased_sector,
};

/// Error type for stream operations.
#[derive(Debug)]
pub enum StreamError<E> {
    /// Error from the underlying storage.
    Storage(E),
    /// Seek to a negative or overflowing position.
    InvalidSeek,
}

impl<E: fmt::Display> fmt::Display for StreamError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::InvalidSeek => write!(f, "Invalid seek position"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for StreamError<E> {}

impl<E> From<StreamError<E>> for io::Error
where
    E: fmt::Debug + fmt::Display + Send + Sync + 'static,
{
    fn from(err: StreamError<E>) -> Self {
        let kind = match err {
            StreamError::Storage(_) => io::ErrorKind::Other,
            StreamError::InvalidSeek => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}

/// Byte stream over a flash region.
///
/// # Examples
///
/// ```
/// use std::io::{Read, Seek, SeekFrom, Write};
/// use flashinst_adapters::{FlashStream, MemoryFlash, NorFlashAdapter, NorFlashConfig};
///
/// let flash = MemoryFlash::new(64 * 1024);
/// let adapter = NorFlashAdapter::new(flash, NorFlashConfig::new(0, 16)).unwrap();
/// let mut stream = FlashStream::new(adapter);
///
/// stream.write_all(b"hello").unwrap();
/// stream.seek(SeekFrom::Start(0)).unwrap();
/// let mut buf = [0u8; 5];
/// stream.read_exact(&mut buf).unwrap();
/// assert_eq!(&buf, b"hello");
/// ```
pub struct FlashStream<S> {
    storage: S,
    cache: Option<Sector>,
    position: u64,
    capacity: u64,
}

impl<S: SectorStorage> FlashStream<S> {
    /// Create a stream positioned at the start of the region.
    pub fn new(storage: S) -> Self {
        let capacity = storage.capacity();
        Self {
            storage,
            cache: None,
            position: 0,
            capacity,
        }
    }

    /// Region size in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get a reference to the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Get a mutable reference to the underlying storage.
    ///
    /// Drops the cached sector, since the caller may change the flash behind
    /// the stream's back.
    pub fn storage_mut(&mut self) -> &mut S {
        self.cache = None;
        &mut self.storage
    }

    /// Consume the stream and return the underlying storage.
    pub fn into_inner(self) -> S {
        self.storage
    }

    fn span(&self, requested: usize) -> (SectorNumber, usize, usize) {
        let number = SectorNumber::containing(self.position);
        let offset = (self.position - number.byte_offset()) as usize;
        let remaining = self.capacity - self.position;
        let len = (requested.min(SECTOR_SIZE - offset) as u64).min(remaining) as usize;
        (number, offset, len)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError<S::Error>> {
        if buf.is_empty() || self.position >= self.capacity {
            return Ok(0);
        }
        let (number, offset, len) = self.span(buf.len());
        let sector = load_sector(&mut self.storage, &mut self.cache, number)?;
        buf[..len].copy_from_slice(&sector.data()[offset..offset + len]);
        self.position += len as u64;
        Ok(len)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<usize, StreamError<S::Error>> {
        if buf.is_empty() || self.position >= self.capacity {
            return Ok(0);
        }
        let (number, offset, len) = self.span(buf.len());
        let bytes = &buf[..len];
        let sector = load_sector(&mut self.storage, &mut self.cache, number)?;

        let result = match sector.classify(offset, bytes) {
            SectorUpdate::Unchanged => None,
            SectorUpdate::Program => {
                let image = sector.patched(offset, bytes);
                Some((
                    self.storage.program(number, &image, offset..offset + len),
                    image,
                ))
            }
            SectorUpdate::EraseAndWrite => {
                let image = sector.patched(offset, bytes);
                Some((self.storage.erase_and_write(number, &image), image))
            }
        };

        match result {
            None => {}
            Some((Ok(()), image)) => sector.replace(image),
            Some((Err(e), _)) => {
                sector.mark_stale();
                return Err(StreamError::Storage(e));
            }
        }

        self.position += len as u64;
        Ok(len)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64, StreamError<S::Error>> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.capacity.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or(StreamError::InvalidSeek)?;
        Ok(self.position)
    }
}

/// Return the cached sector, reading it from flash on a miss or when the
/// cached copy went stale.
fn load_sector<'c, S: SectorStorage>(
    storage: &mut S,
    cache: &'c mut Option<Sector>,
    number: SectorNumber,
) -> Result<&'c mut Sector, StreamError<S::Error>> {
    let cached = cache
        .take()
        .filter(|sector| sector.number() == number && sector.state().is_clean());
    let sector = match cached {
        Some(sector) => sector,
        None => {
            let mut buf = erased_sector();
            storage
                .read_sector(number, &mut buf)
                .map_err(StreamError::Storage)?;
            Sector::new(number, buf)
        }
    };
    Ok(cache.insert(sector))
}

impl<S> io::Read for FlashStream<S>
where
    S: SectorStorage,
    S::Error: Send + Sync + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl<S> io::Write for FlashStream<S>
where
    S: SectorStorage,
    S::Error: Send + Sync + 'static,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.storage
            .sync()
            .map_err(|e| io::Error::from(StreamError::Storage(e)))
    }
}

impl<S> io::Seek for FlashStream<S>
where
    S: SectorStorage,
    S::Error: Send + Sync + 'static,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryFlash, NorFlashAdapter, NorFlashConfig};
    use std::io::{Read, Seek, Write};

    const PAGES: u32 = 4;

    fn stream(flash: &mut MemoryFlash) -> FlashStream<NorFlashAdapter<&mut MemoryFlash>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let adapter = NorFlashAdapter::new(flash, NorFlashConfig::new(0, PAGES)).unwrap();
        FlashStream::new(adapter)
    }

    #[test]
    fn test_write_across_sector_boundary() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        let data: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();
        {
            let mut s = stream(&mut flash);
            s.seek(SeekFrom::Start(3000)).unwrap();
            s.write_all(&data).unwrap();
            assert_eq!(s.position(), 9000);

            s.seek(SeekFrom::Start(3000)).unwrap();
            let mut back = vec![0u8; data.len()];
            s.read_exact(&mut back).unwrap();
            assert_eq!(back, data);
        }
        assert_eq!(&flash.image()[3000..9000], &data[..]);
        assert_eq!(flash.image()[2999], 0xFF);
    }

    #[test]
    fn test_erase_only_when_bits_are_set() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        {
            let mut s = stream(&mut flash);
            // erased -> data only clears bits
            s.write_all(&[0x0F; 16]).unwrap();
            // same bytes again, skipped
            s.seek(SeekFrom::Start(0)).unwrap();
            s.write_all(&[0x0F; 16]).unwrap();
        }
        assert_eq!(flash.erase_count(), 0);
        assert_eq!(flash.program_count(), 1);

        {
            let mut s = stream(&mut flash);
            s.seek(SeekFrom::Start(4)).unwrap();
            s.write_all(&[0xF0]).unwrap();
        }
        assert_eq!(flash.erase_count(), 1);
        assert_eq!(&flash.image()[..6], &[0x0F, 0x0F, 0x0F, 0x0F, 0xF0, 0x0F]);
    }

    #[test]
    fn test_read_and_write_at_end() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        let mut s = stream(&mut flash);
        let end = s.seek(SeekFrom::End(0)).unwrap();
        assert_eq!(end, u64::from(PAGES) * SECTOR_SIZE as u64);

        let mut buf = [0u8; 8];
        assert_eq!(s.read(&mut buf).unwrap(), 0);
        assert_eq!(s.write(b"x").unwrap(), 0);

        s.seek(SeekFrom::End(-2)).unwrap();
        assert_eq!(s.write(b"abcd").unwrap(), 2);
    }

    #[test]
    fn test_negative_seek_rejected() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        let mut s = stream(&mut flash);
        let err = s.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn test_write_protected_flash_fails_on_first_write() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        flash.set_write_protected(true);
        let mut s = stream(&mut flash);

        let mut buf = [0u8; 4];
        s.read_exact(&mut buf).unwrap();

        s.seek(SeekFrom::Start(0)).unwrap();
        let err = s.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn test_failed_commit_reloads_sector() {
        let mut flash = MemoryFlash::new(PAGES as usize * SECTOR_SIZE);
        {
            let mut s = stream(&mut flash);
            s.write_all(b"keep").unwrap();
            s.storage_mut().flash_mut().set_write_protected(true);
            s.seek(SeekFrom::Start(0)).unwrap();
            assert!(s.write(b"lost").is_err());

            s.storage_mut().flash_mut().set_write_protected(false);
            s.seek(SeekFrom::Start(0)).unwrap();
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"keep");
        }
    }
}
