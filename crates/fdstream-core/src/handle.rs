//! `OwnedHandle` and the raw descriptor conversion traits.

use crate::unix::{self, INVALID_DESCRIPTOR, RawFileDescriptor};
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::process::Stdio;

/// `AsRawFileDescriptor` is a platform independent trait for returning
/// a non-owning reference to the underlying platform file descriptor
/// type.
pub trait AsRawFileDescriptor {
    fn as_raw_file_descriptor(&self) -> RawFileDescriptor;
}

/// `IntoRawFileDescriptor` is a platform independent trait for converting
/// an instance into the underlying platform file descriptor type.
pub trait IntoRawFileDescriptor {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor;
}

/// `FromRawFileDescriptor` is a platform independent trait for creating
/// an instance from the underlying platform file descriptor type.
pub trait FromRawFileDescriptor {
    /// Construct `Self` from a raw file descriptor, taking ownership.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `fd` is either negative or a valid, open
    /// file descriptor whose ownership is transferred to the returned value.
    /// After calling this function, the caller must not close or otherwise
    /// use `fd` independently of the returned value.
    unsafe fn from_raw_file_descriptor(fd: RawFileDescriptor) -> Self;
}

/// Exclusive owner of one platform descriptor, or of nothing.
///
/// A handle is either *unowned* (the sentinel value) or refers to a
/// descriptor that is currently open. It cannot be cloned; moving it moves
/// ownership. Dropping an owned handle closes it.
#[derive(Debug)]
pub struct OwnedHandle {
    handle: RawFileDescriptor,
}

impl OwnedHandle {
    /// A handle that owns nothing.
    pub const fn unowned() -> Self {
        Self {
            handle: INVALID_DESCRIPTOR,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.handle != INVALID_DESCRIPTOR
    }

    /// Move the descriptor out, leaving this handle unowned.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::unowned())
    }

    /// Close the descriptor.
    ///
    /// On success the handle becomes unowned. On failure it is left
    /// untouched: the platform may still consider the descriptor open, and
    /// the caller decides whether to retry or to give the descriptor up.
    /// Releasing an unowned handle fails with `EBADF` without a syscall.
    pub fn release(&mut self) -> io::Result<()> {
        if !self.is_valid() {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        unix::close(self.handle)?;
        self.handle = INVALID_DESCRIPTOR;
        Ok(())
    }
}

impl Default for OwnedHandle {
    fn default() -> Self {
        Self::unowned()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if self.is_valid() {
            if let Err(err) = unix::close(self.handle) {
                tracing::warn!(fd = self.handle, error = %err, "close failed while dropping handle");
            }
        }
    }
}

impl IntoRawFileDescriptor for OwnedHandle {
    fn into_raw_file_descriptor(self) -> RawFileDescriptor {
        let fd = self.handle;
        std::mem::forget(self);
        fd
    }
}

impl FromRawFileDescriptor for OwnedHandle {
    unsafe fn from_raw_file_descriptor(fd: RawFileDescriptor) -> Self {
        Self {
            handle: if fd < 0 { INVALID_DESCRIPTOR } else { fd },
        }
    }
}

impl AsRawFd for OwnedHandle {
    fn as_raw_fd(&self) -> RawFileDescriptor {
        self.handle
    }
}

impl IntoRawFd for OwnedHandle {
    fn into_raw_fd(self) -> RawFileDescriptor {
        self.into_raw_file_descriptor()
    }
}

impl From<OwnedFd> for OwnedHandle {
    fn from(fd: OwnedFd) -> Self {
        Self {
            handle: fd.into_raw_fd(),
        }
    }
}

impl From<std::fs::File> for OwnedHandle {
    fn from(file: std::fs::File) -> Self {
        OwnedFd::from(file).into()
    }
}

/// Hands the descriptor to a child process configuration.
/// An unowned handle becomes `Stdio::null()`.
impl From<OwnedHandle> for Stdio {
    fn from(handle: OwnedHandle) -> Self {
        if !handle.is_valid() {
            return Stdio::null();
        }
        let fd = handle.into_raw_file_descriptor();
        unsafe { Stdio::from_raw_fd(fd) }
    }
}

impl<T: AsRawFd> AsRawFileDescriptor for T {
    fn as_raw_file_descriptor(&self) -> RawFileDescriptor {
        self.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unix;

    fn pipe_handles() -> (OwnedHandle, OwnedHandle) {
        unix::pipe().unwrap()
    }

    #[test]
    fn unowned_is_not_valid() {
        let handle = OwnedHandle::unowned();
        assert!(!handle.is_valid());
        assert_eq!(handle.as_raw_file_descriptor(), -1);
    }

    #[test]
    fn default_is_unowned() {
        assert!(!OwnedHandle::default().is_valid());
    }

    #[test]
    fn negative_raw_value_normalizes_to_unowned() {
        let handle = unsafe { OwnedHandle::from_raw_file_descriptor(-42) };
        assert!(!handle.is_valid());
        assert_eq!(handle.as_raw_file_descriptor(), -1);
    }

    #[test]
    fn release_resets_to_unowned() {
        let (mut read, _write) = pipe_handles();
        assert!(read.is_valid());
        read.release().unwrap();
        assert!(!read.is_valid());
    }

    #[test]
    fn release_of_unowned_reports_ebadf() {
        let mut handle = OwnedHandle::unowned();
        let err = handle.release().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn take_moves_ownership() {
        let (mut read, _write) = pipe_handles();
        let fd = read.as_raw_file_descriptor();
        let moved = read.take();
        assert!(!read.is_valid());
        assert_eq!(moved.as_raw_file_descriptor(), fd);
    }

    #[test]
    fn into_raw_then_from_raw_roundtrip() {
        let (read, _write) = pipe_handles();
        let fd = read.into_raw_file_descriptor();
        assert!(fd >= 0);
        let back = unsafe { OwnedHandle::from_raw_file_descriptor(fd) };
        assert_eq!(back.as_raw_fd(), fd);
    }

    #[test]
    fn from_file_takes_descriptor() {
        let file = tempfile::tempfile().unwrap();
        let handle = OwnedHandle::from(file);
        assert!(handle.is_valid());
    }

    #[test]
    fn unowned_handle_becomes_null_stdio() {
        let _stdio: Stdio = OwnedHandle::unowned().into();
    }

    #[test]
    fn debug_names_type() {
        let debug = format!("{:?}", OwnedHandle::unowned());
        assert!(debug.contains("OwnedHandle"));
    }
}
