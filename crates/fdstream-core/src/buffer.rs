//! The bridge between buffered streams and single-shot OS calls.
//!
//! A [`BufferAdapter`] owns a device and two byte regions. `underflow`
//! refills the input region with exactly one read; `overflow` drains the
//! output region with exactly one write. Neither hook retries on a short
//! transfer: the count the platform returns is the count reported.
//!
//! Capacities are expressed in units of `U` (see [`CharUnit`]). A direction
//! with capacity zero is disabled: nothing is allocated and its hook
//! returns 0 without touching the device.

use crate::descriptor::FileDescriptor;
use crate::error::Result;
use crate::process::Process;
use crate::unit::CharUnit;
use crate::unix::RawFileDescriptor;
use std::marker::PhantomData;
use std::os::unix::io::AsRawFd;
use tracing::trace;

/// The raw transfer primitives a buffer can sit on.
pub trait RawIo {
    /// One platform read into `buf`.
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// One platform write of `buf`.
    fn write_raw(&mut self, buf: &[u8]) -> Result<usize>;
    /// Descriptor the input hook reads from, for diagnostics.
    fn input_fd(&self) -> RawFileDescriptor;
    /// Descriptor the output hook writes to, for diagnostics.
    fn output_fd(&self) -> RawFileDescriptor;
}

/// Files and pipe ends: both hooks use the same descriptor.
impl RawIo for FileDescriptor {
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf)
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<usize> {
        self.write(buf)
    }

    fn input_fd(&self) -> RawFileDescriptor {
        self.as_raw_fd()
    }

    fn output_fd(&self) -> RawFileDescriptor {
        self.as_raw_fd()
    }
}

/// Child processes: output goes to the child's stdin, input comes from its
/// stdout. Stderr is not buffered.
impl RawIo for Process {
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stdout().read(buf)
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<usize> {
        self.stdin().write(buf)
    }

    fn input_fd(&self) -> RawFileDescriptor {
        self.stdout().as_raw_fd()
    }

    fn output_fd(&self) -> RawFileDescriptor {
        self.stdin().as_raw_fd()
    }
}

#[derive(Debug)]
pub struct BufferAdapter<U: CharUnit, D> {
    device: D,
    input: Vec<u8>,
    in_start: usize,
    in_end: usize,
    output: Vec<u8>,
    out_capacity: usize,
    _unit: PhantomData<U>,
}

impl<U: CharUnit, D: RawIo> BufferAdapter<U, D> {
    /// An adapter with both directions disabled.
    pub fn new(device: D) -> Self {
        Self::with_capacity(device, 0, 0)
    }

    /// Capacities are in units.
    pub fn with_capacity(device: D, input_units: usize, output_units: usize) -> Self {
        let mut adapter = Self {
            device,
            input: Vec::new(),
            in_start: 0,
            in_end: 0,
            output: Vec::new(),
            out_capacity: 0,
            _unit: PhantomData,
        };
        adapter.set_capacity(input_units, output_units);
        adapter
    }

    /// Resize both regions, discarding anything buffered.
    pub fn set_capacity(&mut self, input_units: usize, output_units: usize) {
        self.input = vec![0; input_units * U::WIDTH];
        self.in_start = 0;
        self.in_end = 0;
        self.out_capacity = output_units * U::WIDTH;
        self.output = Vec::with_capacity(self.out_capacity);
    }

    pub fn input_capacity(&self) -> usize {
        self.input.len() / U::WIDTH
    }

    pub fn output_capacity(&self) -> usize {
        self.out_capacity / U::WIDTH
    }

    /// Buffered input bytes not yet consumed.
    pub fn available_input(&self) -> usize {
        self.in_end - self.in_start
    }

    /// Buffered output bytes not yet written.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    /// Refill the input region with one read sized to its free space.
    ///
    /// Returns the raw byte count (0 at end of input, or when the
    /// direction is disabled or the region is full).
    pub fn underflow(&mut self) -> Result<usize> {
        if self.input.is_empty() {
            return Ok(0);
        }
        if self.in_start > 0 {
            self.input.copy_within(self.in_start..self.in_end, 0);
            self.in_end -= self.in_start;
            self.in_start = 0;
        }
        if self.in_end == self.input.len() {
            return Ok(0);
        }
        let n = self.device.read_raw(&mut self.input[self.in_end..])?;
        self.in_end += n;
        trace!(fd = self.device.input_fd(), bytes = n, "underflow");
        Ok(n)
    }

    /// Write the pending output with one write.
    ///
    /// Returns the raw byte count written; those bytes are removed from the
    /// front of the region and the rest stays pending.
    pub fn overflow(&mut self) -> Result<usize> {
        if self.output.is_empty() {
            return Ok(0);
        }
        let n = self.device.write_raw(&self.output)?;
        self.output.drain(..n);
        trace!(
            fd = self.device.output_fd(),
            bytes = n,
            pending = self.output.len(),
            "overflow"
        );
        Ok(n)
    }

    /// The buffered input bytes.
    pub fn input_bytes(&self) -> &[u8] {
        &self.input[self.in_start..self.in_end]
    }

    /// Mark `n` buffered input bytes as read.
    pub fn consume_input(&mut self, n: usize) {
        self.in_start = (self.in_start + n).min(self.in_end);
        if self.in_start == self.in_end {
            self.in_start = 0;
            self.in_end = 0;
        }
    }

    /// Copy whole units into `out`, refilling when fewer than one unit is
    /// buffered. Returns the number of units copied; 0 means end of input.
    ///
    /// Refills repeat only while a unit is incomplete. Trailing bytes that
    /// never form a whole unit are left buffered.
    pub fn read_units(&mut self, out: &mut [U]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.available_input() < U::WIDTH {
            if self.underflow()? == 0 {
                return Ok(0);
            }
        }
        let units = (self.available_input() / U::WIDTH).min(out.len());
        let bytes = units * U::WIDTH;
        U::read_bytes(
            &self.input[self.in_start..self.in_start + bytes],
            &mut out[..units],
        );
        self.consume_input(bytes);
        Ok(units)
    }

    /// Buffer as many of `units` as fit. While not even one unit fits,
    /// `overflow` is called again as long as each call makes progress; a
    /// short write is not a failure. Returns the number of units accepted,
    /// 0 only when an overflow wrote nothing.
    pub fn write_units(&mut self, units: &[U]) -> Result<usize> {
        if units.is_empty() || self.out_capacity == 0 {
            return Ok(0);
        }
        while self.out_capacity - self.output.len() < U::WIDTH {
            if self.overflow()? == 0 {
                return Ok(0);
            }
        }
        let room = (self.out_capacity - self.output.len()) / U::WIDTH;
        let accepted = room.min(units.len());
        U::write_bytes(&units[..accepted], &mut self.output);
        Ok(accepted)
    }

    pub fn get_ref(&self) -> &D {
        &self.device
    }

    pub fn get_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
