//! Error type for failed OS calls
//!
//! Every failure this crate reports is the failure of one platform call.
//! The variant names the operation and carries the target and operands
//! that were passed to it, with the platform error as the source.

use crate::mode::OpenMode;
use crate::unix::RawFileDescriptor;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The platform operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Access,
    Read,
    Write,
    Close,
    Pipe,
    Spawn,
    Wait,
    Signal,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Access => "access",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
            Self::Pipe => "pipe",
            Self::Spawn => "spawn",
            Self::Wait => "wait",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("open of {path:?} with mode {mode:?} failed")]
    Open {
        path: PathBuf,
        mode: OpenMode,
        source: io::Error,
    },
    #[error("access check of {path:?} for {mode:?} failed")]
    Access {
        path: PathBuf,
        mode: OpenMode,
        source: io::Error,
    },
    #[error("read of {size} bytes from fd {fd} failed")]
    Read {
        fd: RawFileDescriptor,
        size: usize,
        source: io::Error,
    },
    #[error("write of {size} bytes to fd {fd} failed")]
    Write {
        fd: RawFileDescriptor,
        size: usize,
        source: io::Error,
    },
    #[error("close of fd {fd} failed")]
    Close {
        fd: RawFileDescriptor,
        source: io::Error,
    },
    #[error("failed to create a pipe")]
    Pipe(#[source] io::Error),
    #[error("failed to spawn {program:?}")]
    Spawn { program: OsString, source: io::Error },
    #[error("wait for process {pid:?} failed")]
    Wait { pid: Option<u32>, source: io::Error },
    #[error("delivering signal {signal} to process {pid:?} failed")]
    Signal {
        pid: Option<u32>,
        signal: i32,
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The platform operation that reported the failure.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Open { .. } => Operation::Open,
            Self::Access { .. } => Operation::Access,
            Self::Read { .. } => Operation::Read,
            Self::Write { .. } => Operation::Write,
            Self::Close { .. } => Operation::Close,
            Self::Pipe(_) => Operation::Pipe,
            Self::Spawn { .. } => Operation::Spawn,
            Self::Wait { .. } => Operation::Wait,
            Self::Signal { .. } => Operation::Signal,
        }
    }

    /// The error reported by the platform.
    pub fn os_error(&self) -> &io::Error {
        match self {
            Self::Open { source, .. }
            | Self::Access { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::Close { source, .. }
            | Self::Spawn { source, .. }
            | Self::Wait { source, .. }
            | Self::Signal { source, .. }
            | Self::Pipe(source) => source,
        }
    }

    /// Discard the context and keep only the platform error.
    pub fn into_os_error(self) -> io::Error {
        match self {
            Self::Open { source, .. }
            | Self::Access { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::Close { source, .. }
            | Self::Spawn { source, .. }
            | Self::Wait { source, .. }
            | Self::Signal { source, .. }
            | Self::Pipe(source) => source,
        }
    }

    /// Shorthand for `self.os_error().raw_os_error()`.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.os_error().raw_os_error()
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = err.os_error().kind();
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn ebadf() -> io::Error {
        io::Error::from_raw_os_error(libc::EBADF)
    }

    // ── Display ───────────────────────────────────────────────

    #[test]
    fn open_display_names_path_and_mode() {
        let err = Error::Open {
            path: PathBuf::from("/no/such/file"),
            mode: OpenMode::READ | OpenMode::EXISTING,
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        let s = err.to_string();
        assert!(s.contains("/no/such/file"));
        assert!(s.contains("READ"));
        assert!(s.contains("EXISTING"));
    }

    #[test]
    fn write_display_names_fd_and_size() {
        let err = Error::Write {
            fd: 7,
            size: 512,
            source: ebadf(),
        };
        let s = err.to_string();
        assert!(s.contains("fd 7"));
        assert!(s.contains("512"));
    }

    #[test]
    fn pipe_display() {
        let err = Error::Pipe(io::Error::from_raw_os_error(libc::EMFILE));
        assert!(err.to_string().contains("pipe"));
    }

    #[test]
    fn spawn_display_names_program() {
        let err = Error::Spawn {
            program: OsString::from("definitely-not-here"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.to_string().contains("definitely-not-here"));
    }

    // ── Accessors ─────────────────────────────────────────────

    #[test]
    fn operation_matches_variant() {
        assert_eq!(Error::Pipe(ebadf()).operation(), Operation::Pipe);
        let close = Error::Close {
            fd: 3,
            source: ebadf(),
        };
        assert_eq!(close.operation(), Operation::Close);
        let wait = Error::Wait {
            pid: None,
            source: io::Error::from_raw_os_error(libc::ECHILD),
        };
        assert_eq!(wait.operation(), Operation::Wait);
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Open.to_string(), "open");
        assert_eq!(Operation::Read.to_string(), "read");
        assert_eq!(Operation::Write.to_string(), "write");
        assert_eq!(Operation::Close.to_string(), "close");
        assert_eq!(Operation::Pipe.to_string(), "pipe");
        assert_eq!(Operation::Spawn.to_string(), "spawn");
        assert_eq!(Operation::Wait.to_string(), "wait");
    }

    #[test]
    fn os_error_and_source_agree() {
        let err = Error::Read {
            fd: 4,
            size: 16,
            source: ebadf(),
        };
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(err.source().is_some());
    }

    #[test]
    fn into_io_error_keeps_kind() {
        let err = Error::Open {
            path: PathBuf::from("x"),
            mode: OpenMode::READ,
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.get_ref().is_some());
    }
}
