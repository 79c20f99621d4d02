//! Mount and install errors.

use std::fmt;
use std::io;

/// Errors raised while bringing a flash volume up.
#[derive(Debug)]
pub enum MountError {
    /// The device could not be read, sized or rewound.
    Io(io::Error),
    /// No usable filesystem and formatting was not allowed.
    Unformatted(io::Error),
    /// Formatting the device failed.
    Format(io::Error),
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "flash volume I/O error: {}", e),
            Self::Unformatted(e) => write!(f, "flash volume is not formatted: {}", e),
            Self::Format(e) => write!(f, "failed to format flash volume: {}", e),
        }
    }
}

impl std::error::Error for MountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Unformatted(e) | Self::Format(e) => Some(e),
        }
    }
}

/// How far an install got.
///
/// A run walks `NotMounted -> Mounted -> FileOpen -> Written -> Closed`.
/// [`InstallError::phase`] reports the last phase reached before a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallPhase {
    /// No volume yet.
    NotMounted,
    /// Volume mounted, target not opened.
    Mounted,
    /// Target created or truncated, payload not fully written.
    FileOpen,
    /// Payload written, handle not yet closed.
    Written,
    /// Handle closed, directory entry committed.
    Closed,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotMounted => "not mounted",
            Self::Mounted => "mounted",
            Self::FileOpen => "file open",
            Self::Written => "written",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors raised while installing a payload.
#[derive(Debug)]
pub enum InstallError {
    /// The volume could not be mounted.
    Mount(MountError),
    /// The target could not be created or truncated.
    FileOpen {
        /// Target path.
        path: String,
        /// Underlying cause.
        source: io::Error,
    },
    /// The payload was not written completely.
    Write {
        /// Target path.
        path: String,
        /// Bytes accepted before the failure.
        written: usize,
        /// Payload length.
        expected: usize,
        /// Underlying cause, `None` when the volume stopped accepting bytes.
        source: Option<io::Error>,
    },
    /// Committing the directory entry failed.
    Close {
        /// Target path.
        path: String,
        /// Underlying cause.
        source: io::Error,
    },
}

impl InstallError {
    /// Last phase the install reached before failing.
    pub fn phase(&self) -> InstallPhase {
        match self {
            Self::Mount(_) => InstallPhase::NotMounted,
            Self::FileOpen { .. } => InstallPhase::Mounted,
            Self::Write { .. } => InstallPhase::FileOpen,
            Self::Close { .. } => InstallPhase::Written,
        }
    }

    /// Target path, if the failure happened after mounting.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Mount(_) => None,
            Self::FileOpen { path, .. } | Self::Write { path, .. } | Self::Close { path, .. } => {
                Some(path)
            }
        }
    }
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount(e) => write!(f, "Failed to mount flash volume: {}", e),
            Self::FileOpen { path, source } => {
                write!(f, "Failed to create file {}: {}", path, source)
            }
            Self::Write {
                path,
                written,
                expected,
                source: Some(e),
            } => write!(
                f,
                "Failed to write {}: {} of {} bytes written: {}",
                path, written, expected, e
            ),
            Self::Write {
                path,
                written,
                expected,
                source: None,
            } => write!(
                f,
                "Failed to write {}: stopped after {} of {} bytes",
                path, written, expected
            ),
            Self::Close { path, source } => write!(f, "Failed to close {}: {}", path, source),
        }
    }
}

impl std::error::Error for InstallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mount(e) => Some(e),
            Self::FileOpen { source, .. } | Self::Close { source, .. } => Some(source),
            Self::Write { source, .. } => source
                .as_ref()
                .map(|e| e as &(dyn std::error::Error + 'static)),
        }
    }
}

impl From<MountError> for InstallError {
    fn from(err: MountError) -> Self {
        Self::Mount(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_reached_before_failure() {
        let open = InstallError::FileOpen {
            path: "/game.js".into(),
            source: io::Error::other("write protected"),
        };
        assert_eq!(open.phase(), InstallPhase::Mounted);
        assert_eq!(open.path(), Some("/game.js"));

        let mount = InstallError::from(MountError::Unformatted(io::Error::other("bad sig")));
        assert_eq!(mount.phase(), InstallPhase::NotMounted);
        assert_eq!(mount.path(), None);
    }

    #[test]
    fn test_display_is_single_line() {
        let err = InstallError::Write {
            path: "/game.js".into(),
            written: 4096,
            expected: 10000,
            source: None,
        };
        let msg = err.to_string();
        assert!(!msg.contains('\n'));
        assert!(msg.contains("4096 of 10000"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = InstallError::Close {
            path: "/a".into(),
            source: io::Error::other("flush"),
        };
        assert!(err.source().is_some());

        let short = InstallError::Write {
            path: "/a".into(),
            written: 0,
            expected: 1,
            source: None,
        };
        assert!(short.source().is_none());
    }
}
