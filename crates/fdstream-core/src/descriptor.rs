//! `FileDescriptor`: an `OwnedHandle` that can be opened, read, written and
//! closed.

use crate::error::{Error, Result};
use crate::handle::{AsRawFileDescriptor, FromRawFileDescriptor, IntoRawFileDescriptor, OwnedHandle};
use crate::mode::{self, DEFAULT_PERMISSIONS, OpenMode, Permissions};
use crate::unix::{self, RawFileDescriptor};
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::Path;
use std::process::Stdio;
use tracing::debug;

/// `FileDescriptor` is a thin wrapper on top of the `OwnedHandle` type that
/// exposes the ability to open, read, write and close the underlying
/// platform descriptor.
///
/// Every `read` and `write` is exactly one platform call. A short transfer
/// is reported as a count, never as an error, and is never retried here.
///
/// ```no_run
/// use fdstream_core::{FileDescriptor, OpenMode};
///
/// let mut fd = FileDescriptor::new();
/// fd.open("/tmp/notes.txt", OpenMode::WRITE | OpenMode::TRUNCATE)?;
/// let written = fd.write(b"hello")?;
/// assert!(written <= 5);
/// fd.close()?;
/// # Ok::<(), fdstream_core::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct FileDescriptor {
    handle: OwnedHandle,
}

impl FileDescriptor {
    /// A descriptor that owns nothing.
    pub const fn new() -> Self {
        Self {
            handle: OwnedHandle::unowned(),
        }
    }

    /// Adopt an already-owned handle.
    pub fn from_handle(handle: OwnedHandle) -> Self {
        Self { handle }
    }

    /// Open `path` with the default creation permissions (`0644`).
    ///
    /// See [`FileDescriptor::open_with_permissions`].
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        self.open_with_permissions(path, mode, DEFAULT_PERMISSIONS)
    }

    /// Open `path` with one `open(2)` call.
    ///
    /// A handle that is already held is closed first; if that close fails
    /// the error is returned and nothing is opened. On failure of the open
    /// itself the descriptor stays unowned.
    pub fn open_with_permissions(
        &mut self,
        path: impl AsRef<Path>,
        mode: OpenMode,
        permissions: Permissions,
    ) -> Result<()> {
        let path = path.as_ref();
        if self.is_open() {
            self.close()?;
        }

        let flags = mode::open_flags(mode);
        let perms = mode::permission_flags(permissions);
        match unix::open(path, flags, perms) {
            Ok(handle) => {
                debug!(
                    path = %path.display(),
                    ?mode,
                    %permissions,
                    fd = handle.as_raw_fd(),
                    "opened file"
                );
                self.handle = handle;
                Ok(())
            }
            Err(source) => Err(Error::Open {
                path: path.to_path_buf(),
                mode,
                source,
            }),
        }
    }

    /// One `read(2)` into `buf`. Zero means the end of the resource.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let fd = self.handle.as_raw_fd();
        unix::read(fd, buf).map_err(|source| Error::Read {
            fd,
            size: buf.len(),
            source,
        })
    }

    /// One `write(2)` of `buf`; the count may be short.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let fd = self.handle.as_raw_fd();
        unix::write(fd, buf).map_err(|source| Error::Write {
            fd,
            size: buf.len(),
            source,
        })
    }

    /// Close the held handle.
    ///
    /// On success the descriptor becomes unowned. On failure the handle is
    /// left as it was.
    pub fn close(&mut self) -> Result<()> {
        let fd = self.handle.as_raw_fd();
        self.handle
            .release()
            .map_err(|source| Error::Close { fd, source })?;
        debug!(fd, "closed descriptor");
        Ok(())
    }

    /// Whether a handle is held. No platform call is made.
    pub fn is_open(&self) -> bool {
        self.handle.is_valid()
    }

    /// Adopt `handle` and return the one previously held, which the caller
    /// now owns.
    pub fn set(&mut self, handle: OwnedHandle) -> OwnedHandle {
        std::mem::replace(&mut self.handle, handle)
    }

    /// Move the handle out, leaving this descriptor unowned.
    pub fn take(&mut self) -> OwnedHandle {
        self.handle.take()
    }

    pub fn handle(&self) -> &OwnedHandle {
        &self.handle
    }
}

/// Probe `path` for existence and the permissions named in `mode`
/// without opening or creating anything.
pub fn access(path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
    let path = path.as_ref();
    unix::access(path, mode::access_flags(mode)).map_err(|source| Error::Access {
        path: path.to_path_buf(),
        mode,
        source,
    })
}

impl io::Read for FileDescriptor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FileDescriptor::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for FileDescriptor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileDescriptor::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for FileDescriptor {
    fn as_raw_fd(&self) -> RawFileDescriptor {
        self.handle.as_raw_file_descriptor()
    }
}

impl IntoRawFd for FileDescriptor {
    fn into_raw_fd(self) -> RawFileDescriptor {
        self.handle.into_raw_file_descriptor()
    }
}

impl IntoRawFileDescriptor for FileDescriptor {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor {
        self.handle.into_raw_file_descriptor()
    }
}

#[allow(unsafe_code)]
impl FromRawFileDescriptor for FileDescriptor {
    unsafe fn from_raw_file_descriptor(fd: RawFileDescriptor) -> Self {
        Self {
            handle: unsafe { OwnedHandle::from_raw_file_descriptor(fd) },
        }
    }
}

impl From<OwnedHandle> for FileDescriptor {
    fn from(handle: OwnedHandle) -> Self {
        Self::from_handle(handle)
    }
}

impl From<std::fs::File> for FileDescriptor {
    fn from(file: std::fs::File) -> Self {
        Self::from_handle(file.into())
    }
}

impl From<FileDescriptor> for OwnedHandle {
    fn from(fd: FileDescriptor) -> Self {
        fd.handle
    }
}

impl From<FileDescriptor> for Stdio {
    fn from(fd: FileDescriptor) -> Self {
        fd.handle.into()
    }
}
