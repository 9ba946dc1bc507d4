//! Character units: the element type a stream buffers.
//!
//! The buffer adapter stores raw bytes and counts capacity in units; a
//! [`CharUnit`] supplies the unit width and the byte conversion. Bytes are
//! in native order, so wide streams are only meant to be read back on the
//! same machine.

use std::fmt::Debug;

pub trait CharUnit: Copy + Default + Debug + Send + 'static {
    /// Width of one unit in bytes.
    const WIDTH: usize;

    /// Append the native-endian bytes of `units` to `out`.
    fn write_bytes(units: &[Self], out: &mut Vec<u8>);

    /// Decode whole units from `bytes` into `out`; `bytes.len()` must be a
    /// multiple of `WIDTH`.
    fn read_bytes(bytes: &[u8], out: &mut [Self]);

    /// Encode text into units.
    fn encode_str(s: &str, out: &mut Vec<Self>);
}

impl CharUnit for u8 {
    const WIDTH: usize = 1;

    fn write_bytes(units: &[Self], out: &mut Vec<u8>) {
        out.extend_from_slice(units);
    }

    fn read_bytes(bytes: &[u8], out: &mut [Self]) {
        out.copy_from_slice(bytes);
    }

    fn encode_str(s: &str, out: &mut Vec<Self>) {
        out.extend_from_slice(s.as_bytes());
    }
}

impl CharUnit for u16 {
    const WIDTH: usize = 2;

    fn write_bytes(units: &[Self], out: &mut Vec<u8>) {
        for unit in units {
            out.extend_from_slice(&unit.to_ne_bytes());
        }
    }

    fn read_bytes(bytes: &[u8], out: &mut [Self]) {
        for (unit, chunk) in out.iter_mut().zip(bytes.chunks_exact(Self::WIDTH)) {
            *unit = u16::from_ne_bytes([chunk[0], chunk[1]]);
        }
    }

    /// UTF-16 code units.
    fn encode_str(s: &str, out: &mut Vec<Self>) {
        out.extend(s.encode_utf16());
    }
}

impl CharUnit for u32 {
    const WIDTH: usize = 4;

    fn write_bytes(units: &[Self], out: &mut Vec<u8>) {
        for unit in units {
            out.extend_from_slice(&unit.to_ne_bytes());
        }
    }

    fn read_bytes(bytes: &[u8], out: &mut [Self]) {
        for (unit, chunk) in out.iter_mut().zip(bytes.chunks_exact(Self::WIDTH)) {
            *unit = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }

    /// One unit per `char`.
    fn encode_str(s: &str, out: &mut Vec<Self>) {
        out.extend(s.chars().map(u32::from));
    }
}
