//! Anonymous pipes whose two ends are owned `FileDescriptor`s.

use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::unix;

/// Represents the readable and writable ends of a pair of descriptors
/// connected via a kernel pipe.
///
/// ```
/// use fdstream_core::{Error, Pipe};
///
/// let mut pipe = Pipe::new()?;
/// pipe.write.write(b"hello")?;
/// pipe.write.close()?;
///
/// let mut buf = [0u8; 16];
/// let n = pipe.read.read(&mut buf)?;
/// assert_eq!(&buf[..n], b"hello");
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct Pipe {
    /// The readable end of the pipe
    pub read: FileDescriptor,
    /// The writable end of the pipe
    pub write: FileDescriptor,
}

impl Pipe {
    /// Create both ends with one platform call. Both ends are
    /// close-on-exec; on failure neither end exists.
    pub fn new() -> Result<Pipe> {
        let (read, write) = unix::pipe().map_err(Error::Pipe)?;
        tracing::trace!(read = ?read, write = ?write, "created pipe");
        Ok(Pipe {
            read: FileDescriptor::from_handle(read),
            write: FileDescriptor::from_handle(write),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn round_trip() {
        let mut pipe = Pipe::new().unwrap();
        assert_eq!(pipe.write.write(b"hello").unwrap(), 5);
        pipe.write.close().unwrap();

        let mut buf = [0u8; 16];
        let n = pipe.read.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(pipe.read.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn both_ends_are_open_and_distinct() {
        let pipe = Pipe::new().unwrap();
        assert!(pipe.read.is_open());
        assert!(pipe.write.is_open());
        assert_ne!(pipe.read.as_raw_fd(), pipe.write.as_raw_fd());
    }

    #[test]
    #[allow(unsafe_code)]
    fn ends_are_close_on_exec() {
        let pipe = Pipe::new().unwrap();
        for fd in [pipe.read.as_raw_fd(), pipe.write.as_raw_fd()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }

    #[test]
    fn write_to_closed_reader_fails() {
        let mut pipe = Pipe::new().unwrap();
        pipe.read.close().unwrap();
        // the Rust runtime ignores SIGPIPE, so the write reports EPIPE
        let err = pipe.write.write(b"x").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPIPE));
    }
}
