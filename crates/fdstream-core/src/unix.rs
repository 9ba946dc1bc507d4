//! Thin wrappers around the libc calls used by the crate.
//!
//! Each wrapper issues a single platform call and converts the failure
//! convention into an `io::Error`. No wrapper retries on `EINTR` or on a
//! short transfer; that is left to the callers.

use crate::handle::{FromRawFileDescriptor, OwnedHandle};
use libc::{c_int, mode_t};
use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub type RawFileDescriptor = std::os::unix::io::RawFd;

pub(crate) const INVALID_DESCRIPTOR: RawFileDescriptor = -1;

fn path_to_cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains an interior nul byte",
        )
    })
}

pub(crate) fn open(path: &Path, flags: c_int, perms: mode_t) -> io::Result<OwnedHandle> {
    let path = path_to_cstring(path)?;
    let fd = unsafe {
        libc::open(
            path.as_ptr(),
            flags | libc::O_CLOEXEC,
            libc::c_uint::from(perms),
        )
    };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedHandle::from_raw_file_descriptor(fd) })
}

pub(crate) fn access(path: &Path, flags: c_int) -> io::Result<()> {
    let path = path_to_cstring(path)?;
    if unsafe { libc::access(path.as_ptr(), flags) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn read(fd: RawFileDescriptor, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

pub(crate) fn write(fd: RawFileDescriptor, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

pub(crate) fn close(fd: RawFileDescriptor) -> io::Result<()> {
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Create a pipe whose two ends are both close-on-exec.
/// Returns `(read, write)`.
#[cfg(not(target_vendor = "apple"))]
pub(crate) fn pipe() -> io::Result<(OwnedHandle, OwnedHandle)> {
    let mut fds: [c_int; 2] = [INVALID_DESCRIPTOR; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    let read = unsafe { OwnedHandle::from_raw_file_descriptor(fds[0]) };
    let write = unsafe { OwnedHandle::from_raw_file_descriptor(fds[1]) };
    Ok((read, write))
}

/// Apple platforms lack `pipe2`, so the close-on-exec flag is set
/// right after creation.
#[cfg(target_vendor = "apple")]
pub(crate) fn pipe() -> io::Result<(OwnedHandle, OwnedHandle)> {
    let mut fds: [c_int; 2] = [INVALID_DESCRIPTOR; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    // Wrap first so that both ends are closed if marking them fails.
    let read = unsafe { OwnedHandle::from_raw_file_descriptor(fds[0]) };
    let write = unsafe { OwnedHandle::from_raw_file_descriptor(fds[1]) };
    set_cloexec(fds[0])?;
    set_cloexec(fds[1])?;
    Ok((read, write))
}

#[cfg(target_vendor = "apple")]
fn set_cloexec(fd: RawFileDescriptor) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn kill(pid: u32, signal: c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| io::Error::from_raw_os_error(libc::ESRCH))?;
    if unsafe { libc::kill(pid, signal) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Human readable description of a signal number, as reported by
/// `strsignal(3)`.
pub(crate) fn signal_name(signal: c_int) -> Option<String> {
    let name = unsafe { libc::strsignal(signal) };
    if name.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(name) };
    Some(name.to_string_lossy().into_owned())
}
