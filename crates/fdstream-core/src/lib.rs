//! fdstream-core: buffered character streams over raw OS resources
//!
//! This crate lets ordinary buffered, formatted I/O (`Read`, `BufRead`,
//! `Write`, `fmt::Write`) run on top of an open file, an anonymous pipe, or
//! the standard channels of a spawned child process, without the calling
//! code caring which of the three it is talking to.
//!
//! # Architecture
//!
//! ```text
//! application → Stream<K, D, U>   (formatted front end, sized by direction)
//!                    ↓
//!              BufferAdapter<U, D> (underflow / overflow hooks)
//!                    ↓
//!        FileDescriptor | Process  (exactly one syscall per hook)
//!                    ↓
//!                   OS
//! ```
//!
//! # Modules
//!
//! - `handle`: `OwnedHandle`, the move-only owner of a raw descriptor
//! - `mode`: `OpenMode` / `Permissions` and their translation to platform flags
//! - `descriptor`: `FileDescriptor` with open/read/write/close
//! - `pipe`: atomically created `Pipe` pairs
//! - `process`: child `Process` with stop/wait and `ExitStatus` decoding
//! - `unit`: `CharUnit`, the width/conversion strategy for stream elements
//! - `buffer`: `BufferAdapter`, the fill/flush bridge
//! - `stream`: `Stream` and the file/process stream aliases
//! - `config`: key/value configuration lookup and `StreamConfig`
//! - `logging`: `tracing-subscriber` initialization
//!
//! # Example
//!
//! ```no_run
//! use fdstream_core::{OpenMode, OutputFileStream, StreamConfig};
//! use std::io::Write;
//!
//! let config = StreamConfig::default();
//! let mut out = OutputFileStream::<u8>::open("/tmp/greeting.txt", OpenMode::TRUNCATE, &config)?;
//! writeln!(out, "hello {}", 42)?;
//! out.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Safety
//!
//! Unsafe code is confined to `unix` (the libc calls) and `handle` (adopting
//! and releasing raw descriptors).

#[cfg(not(unix))]
compile_error!("fdstream-core only supports unix platforms");

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod error;
#[allow(unsafe_code)]
pub mod handle;
pub mod logging;
pub mod mode;
pub mod pipe;
pub mod process;
pub mod stream;
pub mod unit;

#[allow(unsafe_code)]
mod unix;

pub use buffer::{BufferAdapter, RawIo};
pub use config::{ConfigError, ConfigSource, EnvSource, Layered, MapSource, StreamConfig, TomlSource};
pub use descriptor::{FileDescriptor, access};
pub use error::{Error, Operation, Result};
pub use handle::{AsRawFileDescriptor, FromRawFileDescriptor, IntoRawFileDescriptor, OwnedHandle};
pub use mode::{OpenMode, Permissions};
pub use pipe::Pipe;
pub use process::{ExitStatus, Process, ProcessKiller};
pub use stream::{
    Duplex, FileStream, Input, InputFileStream, InputProcessStream, Kind, Output,
    OutputFileStream, OutputProcessStream, ProcessStream, Readable, Stream, Writable,
};
pub use unit::CharUnit;
pub use unix::RawFileDescriptor;
