//! Directional streams over files and child processes.
//!
//! A [`Stream`] is a [`BufferAdapter`] plus a direction `K`. The direction
//! decides which buffers exist (an input stream allocates no output buffer
//! and vice versa), which mode bits are always added when opening, and
//! which of the std I/O traits the stream implements.

use crate::buffer::{BufferAdapter, RawIo};
use crate::config::StreamConfig;
use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::handle::OwnedHandle;
use crate::mode::OpenMode;
use crate::process::{ExitStatus, Process, ProcessKiller};
use crate::unit::CharUnit;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::path::Path;
use tracing::warn;

/// Direction of a stream.
pub trait Kind {
    /// Mode bits OR'd into every open.
    const MODE: OpenMode;
}

/// Kinds that buffer input.
pub trait Readable: Kind {}

/// Kinds that buffer output.
pub trait Writable: Kind {}

#[derive(Debug)]
pub enum Input {}

#[derive(Debug)]
pub enum Output {}

#[derive(Debug)]
pub enum Duplex {}

impl Kind for Input {
    const MODE: OpenMode = OpenMode::READ;
}

impl Kind for Output {
    const MODE: OpenMode = OpenMode::WRITE;
}

impl Kind for Duplex {
    const MODE: OpenMode = OpenMode::from_bits_truncate(OpenMode::READ.bits() | OpenMode::WRITE.bits());
}

impl Readable for Input {}
impl Readable for Duplex {}
impl Writable for Output {}
impl Writable for Duplex {}

pub type FileStream<U = u8> = Stream<Duplex, FileDescriptor, U>;
pub type InputFileStream<U = u8> = Stream<Input, FileDescriptor, U>;
pub type OutputFileStream<U = u8> = Stream<Output, FileDescriptor, U>;
pub type ProcessStream<U = u8> = Stream<Duplex, Process, U>;
pub type InputProcessStream<U = u8> = Stream<Input, Process, U>;
pub type OutputProcessStream<U = u8> = Stream<Output, Process, U>;

/// Buffer capacities (input, output) in units for a mode.
fn capacities(mode: OpenMode, size: usize) -> (usize, usize) {
    let input = if mode.is_readable() { size } else { 0 };
    let output = if mode.is_writable() { size } else { 0 };
    (input, output)
}

/// A buffered stream of `U` units over device `D`, in direction `K`.
///
/// Readable `u8` streams implement [`io::Read`] and [`io::BufRead`];
/// writable `u8` streams implement [`io::Write`]; writable `u16`/`u32`
/// streams implement [`fmt::Write`]. Refilling the input buffer first
/// flushes any pending output, so a duplex stream over a filter sees its
/// replies to what was written.
///
/// Pending output is flushed on drop; errors there are only logged.
/// Call `flush`/`close`/`wait` to observe them.
pub struct Stream<K: Kind, D: RawIo, U: CharUnit = u8> {
    buffer: BufferAdapter<U, D>,
    config: StreamConfig,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Kind, D: RawIo, U: CharUnit> Stream<K, D, U> {
    fn with_device(device: D, config: &StreamConfig) -> Self {
        let (input, output) = capacities(K::MODE, config.buffer_size);
        Self {
            buffer: BufferAdapter::with_capacity(device, input, output),
            config: *config,
            _kind: PhantomData,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn buffer(&self) -> &BufferAdapter<U, D> {
        &self.buffer
    }

    /// Input buffer capacity in units; 0 when the stream does not read.
    pub fn input_capacity(&self) -> usize {
        self.buffer.input_capacity()
    }

    /// Output buffer capacity in units; 0 when the stream does not write.
    pub fn output_capacity(&self) -> usize {
        self.buffer.output_capacity()
    }

    /// Repeat `overflow` until no output is pending.
    ///
    /// A write that makes no progress is reported as `WriteZero`.
    pub fn flush_buffer(&mut self) -> Result<()> {
        while self.buffer.pending_output() > 0 {
            if self.buffer.overflow()? == 0 {
                return Err(Error::Write {
                    fd: self.buffer.get_ref().output_fd(),
                    size: self.buffer.pending_output(),
                    source: io::Error::from(io::ErrorKind::WriteZero),
                });
            }
        }
        Ok(())
    }

    fn resize(&mut self, mode: OpenMode) {
        let (input, output) = capacities(mode, self.config.buffer_size);
        self.buffer.set_capacity(input, output);
    }
}

impl<K: Readable, D: RawIo, U: CharUnit> Stream<K, D, U> {
    fn fill(&mut self) -> Result<usize> {
        if self.buffer.pending_output() > 0 {
            self.flush_buffer()?;
        }
        self.buffer.underflow()
    }

    /// Read whole units into `out`; 0 means end of input.
    pub fn read_units(&mut self, out: &mut [U]) -> Result<usize> {
        if self.buffer.available_input() < U::WIDTH && self.buffer.pending_output() > 0 {
            self.flush_buffer()?;
        }
        self.buffer.read_units(out)
    }
}

impl<K: Writable, D: RawIo, U: CharUnit> Stream<K, D, U> {
    /// Buffer as many units as fit; see [`BufferAdapter::write_units`].
    pub fn write_units(&mut self, units: &[U]) -> Result<usize> {
        self.buffer.write_units(units)
    }

    /// Buffer all of `units`, overflowing as often as needed.
    pub fn write_all_units(&mut self, mut units: &[U]) -> Result<()> {
        while !units.is_empty() {
            let n = self.buffer.write_units(units)?;
            if n == 0 {
                return Err(Error::Write {
                    fd: self.buffer.get_ref().output_fd(),
                    size: units.len() * U::WIDTH,
                    source: io::Error::from(io::ErrorKind::WriteZero),
                });
            }
            units = &units[n..];
        }
        Ok(())
    }

    /// Encode `text` in the stream's unit and buffer it.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        let mut units = Vec::with_capacity(text.len());
        U::encode_str(text, &mut units);
        self.write_all_units(&units)
    }
}

impl<K: Kind, U: CharUnit> Stream<K, FileDescriptor, U> {
    /// A stream with no file open yet.
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_device(FileDescriptor::new(), config)
    }

    /// Open `path` with `mode | K::MODE` and the configured permissions.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, config: &StreamConfig) -> Result<Self> {
        let mut stream = Self::new(config);
        stream.open_path(path, mode)?;
        Ok(stream)
    }

    /// Switch to `path`: pending output is flushed to the current file,
    /// which is then closed. Buffers are sized from the effective mode.
    pub fn open_path(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        let mode = mode | K::MODE;
        if self.is_open() {
            self.close()?;
        }
        self.resize(mode);
        let permissions = self.config.permissions;
        self.buffer
            .get_mut()
            .open_with_permissions(path, mode, permissions)
    }

    /// Flush and close the file.
    pub fn close(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.buffer.get_mut().close()
    }

    pub fn is_open(&self) -> bool {
        self.buffer.get_ref().is_open()
    }

    /// Flush to the current handle, then adopt `handle`, discarding
    /// buffered input. The previous handle is returned to the caller.
    pub fn set(&mut self, handle: OwnedHandle) -> Result<OwnedHandle> {
        self.flush_buffer()?;
        self.resize(K::MODE);
        Ok(self.buffer.get_mut().set(handle))
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        self.buffer.get_ref()
    }
}

impl<K: Kind, U: CharUnit> Stream<K, Process, U> {
    /// A stream with no child yet.
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_device(Process::new(), config)
    }

    pub fn spawn<I, S>(argv: I, config: &StreamConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut stream = Self::new(config);
        stream.run(argv)?;
        Ok(stream)
    }

    /// Spawn a child on this stream.
    ///
    /// A stream that does not write closes the child's stdin right away,
    /// so the child sees end of input.
    pub fn run<I, S>(&mut self, argv: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.buffer.get_mut().spawn(argv)?;
        self.resize(K::MODE);
        if !K::MODE.is_writable() {
            self.buffer.get_mut().close_stdin()?;
        }
        Ok(())
    }

    /// Flush pending output, close the child's stdin and wait for it.
    ///
    /// Output the child produced stays readable afterwards.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        if self.buffer.get_ref().stdin().is_open() {
            self.flush_buffer()?;
        }
        self.buffer.get_mut().wait()
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.buffer.get_mut().try_wait()
    }

    pub fn request_stop(&self) -> Result<()> {
        self.buffer.get_ref().request_stop()
    }

    pub fn force_stop(&self) -> Result<()> {
        self.buffer.get_ref().force_stop()
    }

    pub fn killer(&self) -> Option<ProcessKiller> {
        self.buffer.get_ref().killer()
    }

    /// Flush pending output and close the child's stdin.
    pub fn close_stdin(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.buffer.get_mut().close_stdin()
    }

    /// The child's stderr, unbuffered.
    pub fn stderr(&self) -> &FileDescriptor {
        self.buffer.get_ref().stderr()
    }

    pub fn take_stderr(&mut self) -> FileDescriptor {
        self.buffer.get_mut().take_stderr()
    }

    pub fn id(&self) -> Option<u32> {
        self.buffer.get_ref().id()
    }

    pub fn process(&self) -> &Process {
        self.buffer.get_ref()
    }
}

impl<K: Readable, D: RawIo> io::Read for Stream<K, D, u8> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_units(buf)?)
    }
}

impl<K: Readable, D: RawIo> io::BufRead for Stream<K, D, u8> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.buffer.available_input() == 0 {
            self.fill()?;
        }
        Ok(self.buffer.input_bytes())
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume_input(amt);
    }
}

impl<K: Writable, D: RawIo> io::Write for Stream<K, D, u8> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_units(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_buffer()?)
    }
}

macro_rules! wide_fmt_write {
    ($($unit:ty),*) => {
        $(
            impl<K: Writable, D: RawIo> fmt::Write for Stream<K, D, $unit> {
                fn write_str(&mut self, s: &str) -> fmt::Result {
                    self.write_text(s).map_err(|_| fmt::Error)
                }
            }
        )*
    };
}

wide_fmt_write!(u16, u32);

impl<K: Kind, D: RawIo, U: CharUnit> Drop for Stream<K, D, U> {
    fn drop(&mut self) {
        if self.buffer.pending_output() > 0 {
            if let Err(err) = self.flush_buffer() {
                warn!(error = %err, "dropping stream with unflushed output");
            }
        }
    }
}

impl<K: Kind, D: RawIo + fmt::Debug, U: CharUnit> fmt::Debug for Stream<K, D, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("mode", &K::MODE)
            .field("buffer", &self.buffer)
            .field("config", &self.config)
            .finish()
    }
}
