//! Child processes connected through three pipes.
//!
//! A [`Process`] owns the child and the parent's ends of the child's
//! standard channels: the write end of its stdin and the read ends of its
//! stdout and stderr. Spawning is all-or-nothing. Stopping only delivers a
//! signal; reaping happens in [`Process::wait`] or [`Process::try_wait`].

use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::pipe::Pipe;
use crate::unix;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::process::{Child, Command};
use tracing::{debug, warn};

/// Represents the exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    code: i32,
    signal: Option<i32>,
}

impl ExitStatus {
    /// Construct an ExitStatus from a process return code
    pub fn with_exit_code(code: i32) -> Self {
        Self { code, signal: None }
    }

    /// Construct an ExitStatus from a terminating signal number
    pub fn with_signal(signal: i32) -> Self {
        Self {
            code: 1,
            signal: Some(signal),
        }
    }

    /// Returns true if the child exited normally with code zero
    pub fn success(&self) -> bool {
        self.signal.is_none() && self.code == 0
    }

    /// The exit code, or `None` when the child was terminated by a signal
    pub fn exit_code(&self) -> Option<i32> {
        match self.signal {
            None => Some(self.code),
            Some(_) => None,
        }
    }

    /// The terminating signal, if any
    pub fn signal(&self) -> Option<i32> {
        self.signal
    }

    /// Human readable name of the terminating signal, if any
    pub fn signal_name(&self) -> Option<String> {
        self.signal
            .map(|signal| unix::signal_name(signal).unwrap_or_else(|| format!("Signal {signal}")))
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return ExitStatus::with_signal(signal);
        }

        let code = status
            .code()
            .unwrap_or_else(|| if status.success() { 0 } else { 1 });
        ExitStatus::with_exit_code(code)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.success() {
            write!(fmt, "Success")
        } else {
            match self.signal_name() {
                Some(name) => write!(fmt, "Terminated by {}", name),
                None => write!(fmt, "Exited with code {}", self.code),
            }
        }
    }
}

/// Can signal a child independently of the [`Process`] that owns it, for
/// instance from another thread while the owner is blocked in `wait`.
///
/// The killer does not know whether the child has been reaped. Signalling
/// after the owner's `wait` returned may reach an unrelated process that
/// reused the pid.
#[derive(Debug, Clone)]
pub struct ProcessKiller {
    pid: u32,
}

impl ProcessKiller {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Deliver `SIGTERM`.
    pub fn request_stop(&self) -> Result<()> {
        deliver(Some(self.pid), libc::SIGTERM)
    }

    /// Deliver `SIGKILL`.
    pub fn force_stop(&self) -> Result<()> {
        deliver(Some(self.pid), libc::SIGKILL)
    }
}

fn deliver(pid: Option<u32>, signal: i32) -> Result<()> {
    let Some(id) = pid else {
        return Err(Error::Signal {
            pid: None,
            signal,
            source: io::Error::from_raw_os_error(libc::ESRCH),
        });
    };
    unix::kill(id, signal).map_err(|source| Error::Signal {
        pid: Some(id),
        signal,
        source,
    })?;
    debug!(pid = id, signal, "signalled child");
    Ok(())
}

/// A spawned child process and the parent's ends of its standard channels.
///
/// Dropping an unreaped `Process` closes the child's stdin and reaps it,
/// killing it with `SIGKILL` if it has not already exited.
///
/// ```no_run
/// use fdstream_core::Process;
///
/// let mut child = Process::new();
/// child.spawn(["tr", "a-z", "A-Z"])?;
/// child.stdin().write(b"shout\n")?;
/// let status = child.wait()?;
/// let mut buf = [0u8; 16];
/// let n = child.stdout().read(&mut buf)?;
/// assert_eq!(&buf[..n], b"SHOUT\n");
/// assert!(status.success());
/// # Ok::<(), fdstream_core::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Process {
    child: Option<Child>,
    status: Option<ExitStatus>,
    stdin: FileDescriptor,
    stdout: FileDescriptor,
    stderr: FileDescriptor,
}

impl Process {
    /// A process that owns no child.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `argv[0]` (looked up on `PATH`) with the remaining elements as
    /// arguments, connecting its stdin, stdout and stderr to fresh pipes.
    ///
    /// On failure the process is left as it was (a fresh one stays unowned)
    /// and every pipe end created along the way has been closed. An empty
    /// `argv` fails with `InvalidInput`; spawning while a previous child is
    /// still unreaped fails with `EBUSY`.
    pub fn spawn<I, S>(&mut self, argv: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let argv: Vec<OsString> = argv
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(spawn_error(
                OsString::new(),
                io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector"),
            ));
        };
        if self.child.is_some() && self.status.is_none() {
            return Err(spawn_error(
                program.clone(),
                io::Error::from_raw_os_error(libc::EBUSY),
            ));
        }

        let pipe = |program: &OsString| {
            Pipe::new().map_err(|err| spawn_error(program.clone(), err.into_os_error()))
        };
        let stdin = pipe(program)?;
        let stdout = pipe(program)?;
        let stderr = pipe(program)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(stdin.read)
            .stdout(stdout.write)
            .stderr(stderr.write);
        let child = cmd
            .spawn()
            .map_err(|source| spawn_error(program.clone(), source))?;
        // The child's ends live in `cmd`; drop them so that EOF on stdout
        // and stderr follows the child's exit.
        drop(cmd);

        debug!(pid = child.id(), program = ?program, "spawned child");
        *self = Self {
            child: Some(child),
            status: None,
            stdin: stdin.write,
            stdout: stdout.read,
            stderr: stderr.read,
        };
        Ok(())
    }

    /// The child's pid, if one was spawned.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn is_spawned(&self) -> bool {
        self.child.is_some()
    }

    /// Ask the child to stop with `SIGTERM`. Does not block or reap.
    ///
    /// A no-op once the child has been reaped.
    pub fn request_stop(&self) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        deliver(self.id(), libc::SIGTERM)
    }

    /// Stop the child with `SIGKILL`. Does not block or reap.
    ///
    /// A no-op once the child has been reaped.
    pub fn force_stop(&self) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        deliver(self.id(), libc::SIGKILL)
    }

    /// A signaller that can be moved to another thread.
    pub fn killer(&self) -> Option<ProcessKiller> {
        self.id().map(|pid| ProcessKiller { pid })
    }

    /// Close the child's stdin (so a filter sees end of input), then block
    /// until the child terminates.
    ///
    /// Output the child has written stays readable from [`Process::stdout`]
    /// afterwards. Once reaped, further calls return the same status.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let Some(child) = self.child.as_mut() else {
            return Err(Error::Wait {
                pid: None,
                source: io::Error::from_raw_os_error(libc::ECHILD),
            });
        };
        if self.stdin.is_open() {
            self.stdin.close()?;
        }
        let pid = child.id();
        let status: ExitStatus = child
            .wait()
            .map_err(|source| Error::Wait {
                pid: Some(pid),
                source,
            })?
            .into();
        debug!(pid, %status, "child terminated");
        self.status = Some(status);
        Ok(status)
    }

    /// Reap the child if it has terminated, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        let Some(child) = self.child.as_mut() else {
            return Err(Error::Wait {
                pid: None,
                source: io::Error::from_raw_os_error(libc::ECHILD),
            });
        };
        let pid = child.id();
        let status = child
            .try_wait()
            .map_err(|source| Error::Wait {
                pid: Some(pid),
                source,
            })?
            .map(ExitStatus::from);
        if let Some(status) = status {
            debug!(pid, %status, "child terminated");
        }
        self.status = status;
        Ok(status)
    }

    /// The status recorded by the last successful `wait`/`try_wait`.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Write end of the child's stdin.
    pub fn stdin(&self) -> &FileDescriptor {
        &self.stdin
    }

    /// Read end of the child's stdout.
    pub fn stdout(&self) -> &FileDescriptor {
        &self.stdout
    }

    /// Read end of the child's stderr.
    pub fn stderr(&self) -> &FileDescriptor {
        &self.stderr
    }

    /// Close the write end of the child's stdin. Does nothing if it is
    /// already closed.
    pub fn close_stdin(&mut self) -> Result<()> {
        if !self.stdin.is_open() {
            return Ok(());
        }
        self.stdin.close()
    }

    /// Move the stderr read end out, e.g. to drain it on another thread.
    pub fn take_stderr(&mut self) -> FileDescriptor {
        std::mem::take(&mut self.stderr)
    }
}

/// Reaps the child. One that has not exited once its stdin is closed is
/// killed first, so dropping a `Process` never leaves a zombie behind.
impl Drop for Process {
    fn drop(&mut self) {
        if self.child.is_none() || self.status.is_some() {
            return;
        }
        if let Err(err) = self.close_stdin() {
            warn!(error = %err, "failed to close child stdin on drop");
        }
        match self.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "failed to poll child on drop");
                return;
            }
        }
        debug!(pid = ?self.id(), "killing child still running on drop");
        if let Err(err) = self.force_stop() {
            warn!(error = %err, "failed to kill child on drop");
        }
        if let Err(err) = self.wait() {
            warn!(error = %err, "failed to reap child on drop");
        }
    }
}

fn spawn_error(program: OsString, source: io::Error) -> Error {
    Error::Spawn { program, source }
}
