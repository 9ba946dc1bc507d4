//! A close that the platform rejects must leave the descriptor holding its
//! handle.
//!
//! This closes a raw descriptor behind the wrapper's back, so it lives in
//! its own test binary where no other test can be handed the same number.

#![allow(unsafe_code)]

use fdstream_core::{Error, IntoRawFileDescriptor, Pipe};
use std::os::unix::io::AsRawFd;

#[test]
fn failed_close_keeps_the_handle() {
    let mut pipe = Pipe::new().unwrap();
    let fd = pipe.read.as_raw_fd();

    assert_eq!(unsafe { libc::close(fd) }, 0);

    let err = pipe.read.close().unwrap_err();
    match &err {
        Error::Close { fd: reported, source } => {
            assert_eq!(*reported, fd);
            assert_eq!(source.raw_os_error(), Some(libc::EBADF));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(pipe.read.is_open());
    assert_eq!(pipe.read.as_raw_fd(), fd);

    // give up the dead number instead of closing it again on drop
    let Pipe { read, write } = pipe;
    assert_eq!(read.into_raw_file_descriptor(), fd);
    drop(write);
}
