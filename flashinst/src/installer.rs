//! Writing a payload to a fixed path on the flash volume.
//!
//! [`install_file`] is the typed operation: check the payload fits, create or
//! truncate the target, write every byte, commit the directory entry. [`FlashContentInstaller`]
//! wraps it for startup code: failures become one diagnostic line and an
//! [`InstallOutcome`], never a panic or a propagated error.

use std::io::{self, Seek, SeekFrom, Write};

use fatfs::{File, ReadWriteSeek};
use log::{debug, trace};

use crate::diagnostics::{DiagnosticSink, LogSink};
use crate::error::{InstallError, InstallPhase};
use crate::payload::Payload;
use crate::volume::{FlashVolume, MountOptions};

/// Options for a single install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    create_parents: bool,
}

impl InstallOptions {
    /// Default options: parent directories must already exist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create missing parent directories before opening the target.
    pub fn create_parents(mut self, enabled: bool) -> Self {
        self.create_parents = enabled;
        self
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Path as requested.
    pub path: String,
    /// Bytes now stored in the file.
    pub bytes_written: usize,
}

/// Installs `contents` at `path`, replacing whatever was there.
///
/// The target's parent directory must exist. See [`install_file_with`].
pub fn install_file<D: ReadWriteSeek>(
    volume: &FlashVolume<D>,
    path: &str,
    contents: &[u8],
) -> Result<InstallReport, InstallError> {
    install_file_with(volume, path, contents, &InstallOptions::default())
}

/// Installs `contents` at `path` with explicit options.
///
/// # Errors
///
/// - [`InstallError::FileOpen`] if the path is invalid, a parent is missing,
///   the payload does not fit in the free space plus the space the current
///   file holds, or the entry cannot be created or truncated. The existing
///   file is left as it was.
/// - [`InstallError::Write`] if the flash fails or fewer than
///   `contents.len()` bytes are accepted after truncation.
/// - [`InstallError::Close`] if the final directory entry update fails.
pub fn install_file_with<D: ReadWriteSeek>(
    volume: &FlashVolume<D>,
    path: &str,
    contents: &[u8],
    options: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let mut file = open_truncated(volume, path, contents.len(), options).map_err(|source| {
        InstallError::FileOpen {
            path: path.to_owned(),
            source,
        }
    })?;
    trace!("{}: {}", path, InstallPhase::FileOpen);

    match write_all_counted(&mut file, contents) {
        Ok(n) if n == contents.len() => {}
        Ok(n) => {
            return Err(InstallError::Write {
                path: path.to_owned(),
                written: n,
                expected: contents.len(),
                source: None,
            });
        }
        Err((n, source)) => {
            return Err(InstallError::Write {
                path: path.to_owned(),
                written: n,
                expected: contents.len(),
                source: Some(source),
            });
        }
    }
    trace!("{}: {}", path, InstallPhase::Written);

    file.flush().map_err(|source| InstallError::Close {
        path: path.to_owned(),
        source,
    })?;
    drop(file);

    debug!("Installed {} ({} bytes)", path, contents.len());
    Ok(InstallReport {
        path: path.to_owned(),
        bytes_written: contents.len(),
    })
}

/// Creates or truncates the target and commits the empty entry.
fn open_truncated<'a, D: ReadWriteSeek>(
    volume: &'a FlashVolume<D>,
    path: &str,
    len: usize,
    options: &InstallOptions,
) -> io::Result<File<'a, D>> {
    let relative = validate_path(path)?;
    ensure_fits(volume, relative, len)?;
    let root = volume.fs().root_dir();

    if options.create_parents {
        if let Some((parent, _)) = relative.rsplit_once('/') {
            create_dirs(&root, parent)?;
        }
    }

    let mut file = root.create_file(relative)?;
    file.truncate()?;
    file.flush()?;
    Ok(file)
}

/// Fails with `StorageFull` unless `len` bytes fit in the free clusters plus
/// the clusters the current file at `relative` would release.
fn ensure_fits<D: ReadWriteSeek>(
    volume: &FlashVolume<D>,
    relative: &str,
    len: usize,
) -> io::Result<()> {
    let stats = volume.fs().stats()?;
    let cluster_size = u64::from(stats.cluster_size());
    let current = match volume.fs().root_dir().open_file(relative) {
        Ok(mut file) => file.seek(SeekFrom::End(0))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e),
    };

    let needed = (len as u64).div_ceil(cluster_size);
    let available = u64::from(stats.free_clusters()) + current.div_ceil(cluster_size);
    trace!("{}: needs {} clusters, {} available", relative, needed, available);
    if needed > available {
        return Err(io::Error::new(
            io::ErrorKind::StorageFull,
            format!(
                "{} bytes do not fit in {} available bytes",
                len,
                available * cluster_size
            ),
        ));
    }
    Ok(())
}

/// Strips leading and trailing slashes and rejects empty or dot components.
fn validate_path(path: &str) -> io::Result<&str> {
    let relative = path.trim_matches('/');
    let bad = relative.is_empty()
        || relative
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..");
    if bad {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid file path '{}'", path),
        ));
    }
    Ok(relative)
}

fn create_dirs<D: ReadWriteSeek>(root: &fatfs::Dir<'_, D>, parent: &str) -> io::Result<()> {
    let mut end = 0;
    for component in parent.split('/') {
        end += component.len();
        // create_dir opens the directory when it already exists
        root.create_dir(&parent[..end])?;
        end += 1;
    }
    Ok(())
}

/// Writes until `contents` is exhausted or the file stops accepting bytes.
fn write_all_counted<W: Write>(file: &mut W, contents: &[u8]) -> Result<usize, (usize, io::Error)> {
    let mut written = 0;
    while written < contents.len() {
        match file.write(&contents[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err((written, e)),
        }
    }
    Ok(written)
}

/// What a startup install amounted to.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The payload is on the volume.
    Installed(InstallReport),
    /// Setup stopped early; the diagnostic has already been reported.
    Failed(InstallError),
}

impl InstallOutcome {
    /// Whether the payload was installed.
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }

    /// Phase reached: `Closed` on success.
    pub fn phase(&self) -> InstallPhase {
        match self {
            Self::Installed(_) => InstallPhase::Closed,
            Self::Failed(e) => e.phase(),
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&InstallError> {
        match self {
            Self::Installed(_) => None,
            Self::Failed(e) => Some(e),
        }
    }
}

/// Volume and install result from [`FlashContentInstaller::setup`].
#[derive(Debug)]
pub struct Startup<D: ReadWriteSeek> {
    /// The mounted volume, kept for the rest of the program.
    pub volume: Option<FlashVolume<D>>,
    /// How the install went.
    pub outcome: InstallOutcome,
}

/// Startup storage setup: mount the flash volume and install one payload.
///
/// Failures are reported once through the sink and returned as data.
///
/// # Examples
///
/// ```
/// use flashinst::{FlashContentInstaller, MountOptions, Payload, flash_device};
/// use flashinst_adapters::{MemoryFlash, NorFlashConfig};
///
/// let mut flash = MemoryFlash::new(256 * 1024);
/// let device = flash_device(&mut flash, NorFlashConfig::whole(256 * 1024)).unwrap();
///
/// let mut diagnostics = Vec::new();
/// let mut installer = FlashContentInstaller::with_sink(MountOptions::new(), &mut diagnostics);
/// let startup = installer.setup(device, &Payload::new("/game.js", b"x".as_slice()));
///
/// assert!(startup.outcome.is_installed());
/// drop(installer);
/// assert!(diagnostics.is_empty());
/// ```
#[derive(Debug)]
pub struct FlashContentInstaller<S = LogSink> {
    mount: MountOptions,
    install: InstallOptions,
    sink: S,
}

impl FlashContentInstaller<LogSink> {
    /// Installer reporting through `log::error!`.
    pub fn new(mount: MountOptions) -> Self {
        Self::with_sink(mount, LogSink)
    }
}

impl<S: DiagnosticSink> FlashContentInstaller<S> {
    /// Installer reporting through `sink`.
    pub fn with_sink(mount: MountOptions, sink: S) -> Self {
        Self {
            mount,
            install: InstallOptions::default(),
            sink,
        }
    }

    /// Replaces the per-install options.
    pub fn install_options(mut self, options: InstallOptions) -> Self {
        self.install = options;
        self
    }

    /// Mount options in use.
    pub fn mount_options(&self) -> &MountOptions {
        &self.mount
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the installer, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Mounts `device`, formatting it if allowed. Reports and returns `None`
    /// on failure.
    pub fn mount<D: ReadWriteSeek>(&mut self, device: D) -> Option<FlashVolume<D>> {
        match FlashVolume::mount(device, &self.mount) {
            Ok(volume) => Some(volume),
            Err(e) => {
                self.report(&InstallError::Mount(e));
                None
            }
        }
    }

    /// Installs `payload` on an already mounted volume.
    pub fn install<D: ReadWriteSeek>(
        &mut self,
        volume: &FlashVolume<D>,
        payload: &Payload<'_>,
    ) -> InstallOutcome {
        match install_file_with(volume, payload.path(), payload.contents(), &self.install) {
            Ok(report) => InstallOutcome::Installed(report),
            Err(e) => {
                self.report(&e);
                InstallOutcome::Failed(e)
            }
        }
    }

    /// Mounts `device` and installs `payload` on it.
    pub fn setup<D: ReadWriteSeek>(&mut self, device: D, payload: &Payload<'_>) -> Startup<D> {
        match FlashVolume::mount(device, &self.mount) {
            Ok(volume) => {
                let outcome = self.install(&volume, payload);
                Startup {
                    volume: Some(volume),
                    outcome,
                }
            }
            Err(e) => {
                let err = InstallError::Mount(e);
                self.report(&err);
                Startup {
                    volume: None,
                    outcome: InstallOutcome::Failed(err),
                }
            }
        }
    }

    fn report(&mut self, err: &InstallError) {
        self.sink.report(&err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn volume() -> FlashVolume<Cursor<Vec<u8>>> {
        FlashVolume::mount(Cursor::new(vec![0xFF; 256 * 1024]), &MountOptions::new()).unwrap()
    }

    #[test]
    fn test_validate_path() {
        assert_eq!(validate_path("/game.js").unwrap(), "game.js");
        assert_eq!(validate_path("/www/game.js").unwrap(), "www/game.js");
        assert!(validate_path("/").is_err());
        assert!(validate_path("").is_err());
        assert!(validate_path("/a//b").is_err());
        assert!(validate_path("/../b").is_err());
    }

    #[test]
    fn test_write_all_counted_stops_on_zero() {
        let mut buf = [0u8; 4];
        let mut sink = &mut buf[..];
        assert_eq!(write_all_counted(&mut sink, b"abcdef").unwrap(), 4);
    }

    #[test]
    fn test_install_then_overwrite_shorter() {
        let vol = volume();
        install_file(&vol, "/game.js", b"a much longer first payload").unwrap();
        let report = install_file(&vol, "/game.js", b"short").unwrap();
        assert_eq!(report.bytes_written, 5);
        assert_eq!(vol.read_file("/game.js").unwrap(), b"short");
        assert_eq!(vol.file_len("/game.js").unwrap(), 5);
    }

    #[test]
    fn test_empty_payload_leaves_empty_file() {
        let vol = volume();
        install_file(&vol, "/game.js", b"old").unwrap();
        install_file(&vol, "/game.js", b"").unwrap();
        assert!(vol.exists("/game.js"));
        assert_eq!(vol.file_len("/game.js").unwrap(), 0);
    }

    #[test]
    fn test_missing_parent_is_open_error() {
        let vol = volume();
        let err = install_file(&vol, "/www/game.js", b"x").unwrap_err();
        assert!(matches!(err, InstallError::FileOpen { .. }));
        assert_eq!(err.phase(), InstallPhase::Mounted);
    }

    #[test]
    fn test_create_parents() {
        let vol = volume();
        let opts = InstallOptions::new().create_parents(true);
        install_file_with(&vol, "/www/js/game.js", b"x", &opts).unwrap();
        install_file_with(&vol, "/www/js/game.js", b"y", &opts).unwrap();
        assert_eq!(vol.read_file("/www/js/game.js").unwrap(), b"y");
        let names: Vec<_> = vol.list_dir("/www").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["js"]);
    }

    #[test]
    fn test_payload_larger_than_volume_keeps_old_file() {
        let vol = volume();
        install_file(&vol, "/game.js", b"old").unwrap();
        let free = vol.stats().unwrap().free_bytes() as usize;

        let err = install_file(&vol, "/game.js", &vec![7u8; free + 4096]).unwrap_err();
        match &err {
            InstallError::FileOpen { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::StorageFull);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(vol.read_file("/game.js").unwrap(), b"old");
    }

    #[test]
    fn test_replacement_may_reuse_old_clusters() {
        let vol = volume();
        let free = vol.stats().unwrap().free_bytes() as usize;
        install_file(&vol, "/game.js", &vec![1u8; free]).unwrap();
        assert_eq!(vol.stats().unwrap().free_clusters, 0);

        install_file(&vol, "/game.js", &vec![2u8; free]).unwrap();
        assert_eq!(vol.file_len("/game.js").unwrap(), free as u64);
    }

    #[test]
    fn test_directory_in_the_way_is_open_error() {
        let vol = volume();
        vol.fs().root_dir().create_dir("game.js").unwrap();
        let err = install_file(&vol, "/game.js", b"x").unwrap_err();
        assert!(matches!(err, InstallError::FileOpen { .. }));
    }
}
