//! `init_logging` installs a process-wide subscriber, so it gets its own
//! test binary.

use fdstream_core::logging::{LogConfig, LogError, LogFormat, init_logging, is_logging_initialized};

#[test]
fn init_once_then_already_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("logs/fdstream.log");
    let config = LogConfig {
        level: "fdstream_core=debug".to_string(),
        format: LogFormat::Json,
        file: Some(log_file.clone()),
    };

    assert!(!is_logging_initialized());
    init_logging(&config).unwrap();
    assert!(is_logging_initialized());
    assert!(log_file.exists());

    let second = init_logging(&LogConfig::default()).unwrap_err();
    assert!(matches!(second, LogError::AlreadyInitialized));
}
