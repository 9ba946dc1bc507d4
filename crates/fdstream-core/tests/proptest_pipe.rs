//! Property-based tests for moving bytes through pipes.
//!
//! Payloads stay well under the smallest pipe capacity so that a single
//! thread can write everything before reading it back.

use fdstream_core::{BufferAdapter, Pipe};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

fn arb_capacity() -> impl Strategy<Value = usize> {
    prop_oneof![1usize..8, 8usize..512, Just(8192usize)]
}

fn write_fully(pipe: &Pipe, mut data: &[u8]) {
    while !data.is_empty() {
        let n = pipe.write.write(data).unwrap();
        assert!(n > 0);
        data = &data[n..];
    }
}

fn read_to_end(pipe: &Pipe) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = pipe.read.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

// =============================================================================
// Raw descriptors
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pipe_round_trip(payload in arb_payload()) {
        let mut pipe = Pipe::new().unwrap();
        write_fully(&pipe, &payload);
        pipe.write.close().unwrap();
        prop_assert_eq!(read_to_end(&pipe), payload);
    }

    #[test]
    fn pipe_write_reports_at_most_requested(payload in arb_payload()) {
        let pipe = Pipe::new().unwrap();
        let n = pipe.write.write(&payload).unwrap();
        prop_assert!(n <= payload.len());
    }
}

// =============================================================================
// Buffer adapters
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn adapter_round_trip(payload in arb_payload(), out_cap in arb_capacity(), in_cap in arb_capacity()) {
        let pipe = Pipe::new().unwrap();
        let mut writer = BufferAdapter::<u8, _>::with_capacity(pipe.write, 0, out_cap);
        let mut reader = BufferAdapter::<u8, _>::with_capacity(pipe.read, in_cap, 0);

        let mut rest: &[u8] = &payload;
        while !rest.is_empty() {
            let n = writer.write_units(rest).unwrap();
            rest = &rest[n..];
        }
        while writer.pending_output() > 0 {
            prop_assert!(writer.overflow().unwrap() > 0);
        }
        writer.get_mut().close().unwrap();

        let mut back = Vec::new();
        let mut chunk = vec![0u8; in_cap.max(1)];
        loop {
            let n = reader.read_units(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            prop_assert!(n <= in_cap);
            back.extend_from_slice(&chunk[..n]);
        }
        prop_assert_eq!(back, payload);
    }

    #[test]
    fn wide_adapter_round_trip(units in prop::collection::vec(any::<u16>(), 0..1024), cap in 1usize..64) {
        let pipe = Pipe::new().unwrap();
        let mut writer = BufferAdapter::<u16, _>::with_capacity(pipe.write, 0, cap);
        let mut reader = BufferAdapter::<u16, _>::with_capacity(pipe.read, cap, 0);

        let mut rest: &[u16] = &units;
        while !rest.is_empty() {
            let n = writer.write_units(rest).unwrap();
            rest = &rest[n..];
        }
        while writer.pending_output() > 0 {
            writer.overflow().unwrap();
        }
        writer.get_mut().close().unwrap();

        let mut back = Vec::new();
        let mut chunk = [0u16; 7];
        loop {
            let n = reader.read_units(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            back.extend_from_slice(&chunk[..n]);
        }
        prop_assert_eq!(back, units);
    }
}
