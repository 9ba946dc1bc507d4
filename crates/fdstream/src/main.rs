//! fdstream CLI
//!
//! Thin front end over `fdstream-core`: every subcommand goes through the
//! buffered descriptor streams rather than `std::fs`/`std::process`.
//!
//! ```bash
//! fdstream write notes.txt hello world
//! fdstream cat notes.txt
//! fdstream run --input "b\na\n" -- sort
//! fdstream probe --write notes.txt
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fdstream_core::config::{BUFFER_SIZE_KEY, EnvSource, Layered, MapSource};
use fdstream_core::logging::{LogConfig, LogFormat, LogLevel, init_logging};
use fdstream_core::{
    InputFileStream, OpenMode, OutputFileStream, ProcessStream, StreamConfig, access,
};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Buffered I/O over files, pipes and child processes.
#[derive(Parser)]
#[command(name = "fdstream")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML file with a `[stream]` table.
    #[arg(long, global = true, env = "FDSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Buffer size in bytes; overrides the environment and config file.
    #[arg(long, global = true)]
    buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn", env = "FDSTREAM_LOG_LEVEL")]
    log_level: LogLevel,

    /// Log format (pretty or json).
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files to stdout.
    Cat {
        /// Files to read, in order.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write the given words as one line to a file.
    Write {
        /// File to write; created if missing.
        path: PathBuf,

        /// Append instead of truncating.
        #[arg(long)]
        append: bool,

        /// Fail if the file already exists.
        #[arg(long)]
        exclusive: bool,

        /// Words to write, joined by spaces.
        text: Vec<String>,
    },

    /// Run a command, feeding it input and relaying its output and status.
    Run {
        /// Text sent to the child's stdin.
        #[arg(long)]
        input: Option<String>,

        /// Program and arguments.
        #[arg(last = true, required = true)]
        argv: Vec<OsString>,
    },

    /// Check that a path exists and is accessible.
    Probe {
        path: PathBuf,

        /// Require read permission.
        #[arg(long)]
        read: bool,

        /// Require write permission.
        #[arg(long)]
        write: bool,

        /// Require execute permission.
        #[arg(long)]
        exec: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        level: cli.log_level.to_string().to_lowercase(),
        format: cli.log_format,
        file: None,
    })
    .context("failed to initialize logging")?;

    let config = stream_config(&cli)?;
    tracing::debug!(?config, "resolved stream config");

    match cli.command {
        Commands::Cat { paths } => cat(&paths, &config),
        Commands::Write {
            path,
            append,
            exclusive,
            text,
        } => write(&path, append, exclusive, &text, &config),
        Commands::Run { input, argv } => run(&argv, input.as_deref(), &config),
        Commands::Probe {
            path,
            read,
            write,
            exec,
        } => probe(&path, read, write, exec),
    }
}

/// Command line over environment over config file over defaults.
fn stream_config(cli: &Cli) -> Result<StreamConfig> {
    let base = match &cli.config {
        Some(path) => StreamConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    let mut overrides = MapSource::new();
    if let Some(size) = cli.buffer_size {
        overrides.insert(BUFFER_SIZE_KEY, size.to_string());
    }
    let layered = Layered::new().with(overrides).with(EnvSource::new());
    base.with_overrides(&layered)
        .context("invalid stream configuration")
}

fn cat(paths: &[PathBuf], config: &StreamConfig) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for path in paths {
        let mut input = InputFileStream::<u8>::open(path, OpenMode::EXISTING, config)
            .with_context(|| format!("cannot open {}", path.display()))?;
        io::copy(&mut input, &mut out)
            .with_context(|| format!("failed reading {}", path.display()))?;
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn write(
    path: &Path,
    append: bool,
    exclusive: bool,
    text: &[String],
    config: &StreamConfig,
) -> Result<ExitCode> {
    let mut mode = if append {
        OpenMode::APPEND
    } else {
        OpenMode::TRUNCATE
    };
    if exclusive {
        mode |= OpenMode::EXCLUSIVE;
    }
    let mut out = OutputFileStream::<u8>::open(path, mode, config)
        .with_context(|| format!("cannot open {}", path.display()))?;
    writeln!(out, "{}", text.join(" "))?;
    out.close()
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(ExitCode::SUCCESS)
}

fn run(argv: &[OsString], input: Option<&str>, config: &StreamConfig) -> Result<ExitCode> {
    let mut child = ProcessStream::<u8>::spawn(argv, config).context("failed to start command")?;

    // Drain stderr on its own thread so a chatty child cannot block on it.
    let mut stderr = child.take_stderr();
    let relay = std::thread::spawn(move || io::copy(&mut stderr, &mut io::stderr()));

    if let Some(input) = input {
        child.write_all(input.as_bytes())?;
    }
    child.close_stdin()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut child, &mut out).context("failed relaying child output")?;
    out.flush()?;

    let status = child.wait()?;
    match relay.join() {
        Ok(result) => {
            result.context("failed relaying child stderr")?;
        }
        Err(_) => anyhow::bail!("stderr relay thread panicked"),
    }

    eprintln!("{status}");
    Ok(match status.exit_code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Shell convention for a child killed by a signal.
        None => ExitCode::from(u8::try_from(128 + status.signal().unwrap_or(0)).unwrap_or(1)),
    })
}

fn probe(path: &Path, read: bool, write: bool, exec: bool) -> Result<ExitCode> {
    let mut mode = OpenMode::EXISTING;
    if read {
        mode |= OpenMode::READ;
    }
    if write {
        mode |= OpenMode::WRITE;
    }
    if exec {
        mode |= OpenMode::EXECUTE;
    }
    match access(path, mode) {
        Ok(()) => {
            println!("{}: ok", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}: {}", path.display(), err.os_error());
            Ok(ExitCode::FAILURE)
        }
    }
}
