//! File streams end to end: open semantics, sizing, configuration and wide
//! units.

use fdstream_core::config::{Layered, MapSource, TomlSource};
use fdstream_core::{
    Error, FileStream, InputFileStream, OpenMode, OutputFileStream, Permissions, StreamConfig,
    access,
};
use std::fmt::Write as _;
use std::io::{BufRead, Read, Seek, Write};
use std::os::unix::fs::PermissionsExt;

fn small_config() -> StreamConfig {
    StreamConfig {
        buffer_size: 16,
        ..StreamConfig::default()
    }
}

// ── create vs existing ───────────────────────────────────────

#[test]
fn open_without_existing_creates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("created.txt");
    let mut out = OutputFileStream::<u8>::open(&path, OpenMode::empty(), &small_config()).unwrap();
    writeln!(out, "first line").unwrap();
    out.close().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first line\n");
}

#[test]
fn open_existing_on_missing_file_fails_and_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.txt");
    let err = InputFileStream::<u8>::open(&path, OpenMode::EXISTING, &small_config()).unwrap_err();
    match err {
        Error::Open { path: ref reported, mode, ref source } => {
            assert_eq!(reported, &path);
            assert!(mode.contains(OpenMode::EXISTING | OpenMode::READ));
            assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn access_probe_does_not_create() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.txt");
    assert!(access(&path, OpenMode::EXISTING).is_err());
    assert!(!path.exists());
    std::fs::write(&path, b"x").unwrap();
    access(&path, OpenMode::READ).unwrap();
}

// ── lifecycle ────────────────────────────────────────────────

#[test]
fn is_open_tracks_open_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let mut stream = FileStream::<u8>::new(&small_config());
    assert!(!stream.is_open());
    stream.open_path(dir.path().join("f"), OpenMode::empty()).unwrap();
    assert!(stream.is_open());
    stream.close().unwrap();
    assert!(!stream.is_open());
}

#[test]
fn append_mode_keeps_earlier_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal");
    for entry in ["a", "b", "c"] {
        let mut out = OutputFileStream::<u8>::open(&path, OpenMode::APPEND, &small_config()).unwrap();
        writeln!(out, "{entry}").unwrap();
        out.close().unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
}

#[test]
fn exclusive_refuses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once");
    OutputFileStream::<u8>::open(&path, OpenMode::EXCLUSIVE, &small_config()).unwrap();
    let err = OutputFileStream::<u8>::open(&path, OpenMode::EXCLUSIVE, &small_config()).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
}

// ── sizing ───────────────────────────────────────────────────

#[test]
fn buffers_follow_direction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sizing");
    let config = StreamConfig {
        buffer_size: 100,
        ..StreamConfig::default()
    };

    let out = OutputFileStream::<u16>::open(&path, OpenMode::empty(), &config).unwrap();
    assert_eq!(out.input_capacity(), 0);
    assert_eq!(out.output_capacity(), 100);

    let input = InputFileStream::<u16>::open(&path, OpenMode::empty(), &config).unwrap();
    assert_eq!(input.input_capacity(), 100);
    assert_eq!(input.output_capacity(), 0);

    let both = FileStream::<u16>::open(&path, OpenMode::empty(), &config).unwrap();
    assert_eq!(both.input_capacity(), 100);
    assert_eq!(both.output_capacity(), 100);
}

#[test]
fn large_write_through_tiny_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large");
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let config = StreamConfig {
        buffer_size: 7,
        ..StreamConfig::default()
    };
    let mut out = OutputFileStream::<u8>::open(&path, OpenMode::empty(), &config).unwrap();
    out.write_all(&payload).unwrap();
    out.close().unwrap();

    let mut input = InputFileStream::<u8>::open(&path, OpenMode::EXISTING, &config).unwrap();
    let mut back = Vec::new();
    input.read_to_end(&mut back).unwrap();
    assert_eq!(back, payload);
}

// ── configuration ────────────────────────────────────────────

#[test]
fn configured_permissions_apply_to_new_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secret");
    let config = StreamConfig::from_source(&MapSource::new().with("stream.permissions", "600")).unwrap();
    assert_eq!(config.permissions, Permissions::OWNER_READ | Permissions::OWNER_WRITE);

    let out = OutputFileStream::<u8>::open(&path, OpenMode::empty(), &config).unwrap();
    drop(out);
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0, "group/other bits must be clear, got {mode:o}");
}

#[test]
fn layered_toml_and_map_config() {
    let toml = TomlSource::parse("[stream]\nbuffer_size = 32\npermissions = \"640\"\n").unwrap();
    let overrides = MapSource::new().with("stream.buffer_size", "64");
    let config = StreamConfig::from_source(&Layered::new().with(overrides).with(toml)).unwrap();
    assert_eq!(config.buffer_size, 64);
    assert_eq!(config.permissions.to_octal(), 0o640);

    let dir = tempfile::tempdir().unwrap();
    let stream = FileStream::<u8>::open(dir.path().join("cfg"), OpenMode::empty(), &config).unwrap();
    assert_eq!(stream.input_capacity(), 64);
}

// ── duplex and wide streams ──────────────────────────────────

#[test]
fn duplex_writes_are_visible_to_other_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duplex");
    let mut stream = FileStream::<u8>::open(&path, OpenMode::TRUNCATE, &small_config()).unwrap();
    stream.write_all(b"alpha\nbeta\n").unwrap();
    stream.flush().unwrap();

    // a second descriptor on the same file starts at offset zero
    let mut reader = InputFileStream::<u8>::open(&path, OpenMode::EXISTING, &small_config()).unwrap();
    let mut first = String::new();
    reader.read_line(&mut first).unwrap();
    assert_eq!(first, "alpha\n");

    let mut file = std::fs::File::open(&path).unwrap();
    file.rewind().unwrap();
    let mut all = String::new();
    file.read_to_string(&mut all).unwrap();
    assert_eq!(all, "alpha\nbeta\n");
}

#[test]
fn utf16_stream_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utf16");
    let text = "grüße, 世界 \u{1F30D}";

    let mut out = OutputFileStream::<u16>::open(&path, OpenMode::empty(), &small_config()).unwrap();
    write!(out, "{text}").unwrap();
    out.close().unwrap();

    let mut input = InputFileStream::<u16>::open(&path, OpenMode::EXISTING, &small_config()).unwrap();
    let mut units = Vec::new();
    let mut chunk = [0u16; 5];
    loop {
        let n = input.read_units(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        units.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(String::from_utf16(&units).unwrap(), text);
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, units.len() * 2);
}
