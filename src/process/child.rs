//! Running child processes.

use std::borrow::Cow;
use std::fmt::{self, Debug, Formatter};
use std::io;
use std::mem;
use std::process::ExitStatus;
use std::sync::mpsc;
use std::thread;

use crate::error::{SignalError, StreamError, WaitError};
use crate::process::stream::{ChildStderr, ChildStdin, ChildStdout};
use crate::process::Slot;
use crate::sys::{Backend, Native, Process};

/// Termination request delivered by [`Child::signal`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Ask the process to exit (`SIGTERM`).
    Terminate,
    /// Force the process to exit (`SIGKILL`).
    Kill,
}

/// Output of a finished process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Exit status of the process.
    pub status: ExitStatus,
    /// Everything written to stdout, if it was piped.
    pub stdout: Vec<u8>,
    /// Everything written to stderr, if it was piped.
    pub stderr: Vec<u8>,
}

impl Output {
    /// Stdout decoded as UTF-8, with invalid sequences replaced.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Stderr decoded as UTF-8, with invalid sequences replaced.
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Lifecycle of the process identity.
enum State {
    Running(Process),
    Consumed,
}

/// Parent end of one standard stream.
enum Endpoint<T> {
    /// Stream was not configured as a pipe.
    Absent,
    Owned(T),
    /// Moved out through one of the `take_*` methods.
    Taken,
}

impl<T> Endpoint<T> {
    fn new(stream: Option<T>) -> Self {
        stream.map_or(Self::Absent, Self::Owned)
    }

    fn take(&mut self) -> Option<T> {
        match mem::replace(self, Self::Taken) {
            Self::Owned(stream) => Some(stream),
            other => {
                *self = other;
                None
            },
        }
    }
}

/// Handle to a spawned process.
///
/// A child is created by [`Command::spawn`]. It exclusively owns the process
/// identity and the parent ends of all piped streams.
///
/// Exactly one terminal operation ([`wait`], [`wait_with_output`] or a
/// successful [`try_wait`]) may reclaim the process; every later one fails
/// with [`WaitError::ChildAlreadyConsumed`].
///
/// There is no [`Drop`] implementation: dropping a `Child` neither waits for
/// nor kills the process. Processes that are never waited on stay around as
/// zombies on Unix.
///
/// # Examples
///
/// ```no_run
/// use kommand::process::{Command, Stdio};
///
/// let mut child = Command::new("echo").arg("hello").stdout(Stdio::piped()).spawn().unwrap();
///
/// let output = child.wait_with_output().unwrap();
/// assert!(output.status.success());
/// assert_eq!(output.stdout_text(), "hello\n");
///
/// assert!(child.wait().is_err());
/// ```
///
/// [`Command::spawn`]: crate::process::Command::spawn
/// [`wait`]: Child::wait
/// [`wait_with_output`]: Child::wait_with_output
/// [`try_wait`]: Child::try_wait
pub struct Child {
    state: State,
    pid: u32,
    stdin: Endpoint<ChildStdin>,
    stdout: Endpoint<ChildStdout>,
    stderr: Endpoint<ChildStderr>,
}

impl Child {
    pub(crate) fn new(
        process: Process,
        stdin: Option<ChildStdin>,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
    ) -> Self {
        Self {
            pid: Native::process_id(&process),
            state: State::Running(process),
            stdin: Endpoint::new(stdin),
            stdout: Endpoint::new(stdout),
            stderr: Endpoint::new(stderr),
        }
    }

    /// OS-assigned process identifier.
    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Writer for the child's stdin.
    ///
    /// `None` unless stdin was piped and the writer is neither taken nor
    /// closed.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        match &mut self.stdin {
            Endpoint::Owned(stdin) if !stdin.is_closed() => Some(stdin),
            _ => None,
        }
    }

    /// Reader for the child's stdout.
    ///
    /// `None` unless stdout was piped and the reader is neither taken nor
    /// closed.
    pub fn stdout(&mut self) -> Option<&mut ChildStdout> {
        match &mut self.stdout {
            Endpoint::Owned(stdout) if !stdout.is_closed() => Some(stdout),
            _ => None,
        }
    }

    /// Reader for the child's stderr.
    ///
    /// `None` unless stderr was piped and the reader is neither taken nor
    /// closed.
    pub fn stderr(&mut self) -> Option<&mut ChildStderr> {
        match &mut self.stderr {
            Endpoint::Owned(stderr) if !stderr.is_closed() => Some(stderr),
            _ => None,
        }
    }

    /// Move the stdin writer out of the child.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin()?;
        self.stdin.take()
    }

    /// Move the stdout reader out of the child.
    ///
    /// A taken stdout can no longer be collected by
    /// [`wait_with_output`](Self::wait_with_output).
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout()?;
        self.stdout.take()
    }

    /// Move the stderr reader out of the child.
    ///
    /// A taken stderr can no longer be collected by
    /// [`wait_with_output`](Self::wait_with_output).
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr()?;
        self.stderr.take()
    }

    /// Forcibly end the process.
    ///
    /// This does not wait for the process to exit, follow up with
    /// [`wait`](Self::wait) to reclaim it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kommand::process::Command;
    ///
    /// let mut child = Command::new("yes").spawn().unwrap();
    /// child.kill().unwrap();
    /// child.wait().unwrap();
    /// ```
    pub fn kill(&mut self) -> Result<(), SignalError> {
        self.signal(SignalKind::Kill)
    }

    /// Ask the process to end.
    ///
    /// On Windows this is identical to [`kill`](Self::kill).
    pub fn terminate(&mut self) -> Result<(), SignalError> {
        self.signal(SignalKind::Terminate)
    }

    /// Deliver a termination request.
    ///
    /// Fails with [`SignalError::ProcessExited`] once the process was reaped,
    /// since its identifier may already belong to another process.
    pub fn signal(&mut self, kind: SignalKind) -> Result<(), SignalError> {
        match &self.state {
            State::Running(process) => Native::signal_process(process, kind),
            State::Consumed => Err(SignalError::ProcessExited),
        }
    }

    /// Block until the process exits and reclaim it.
    ///
    /// Piped streams are left untouched: close stdin first if the child
    /// only exits at end-of-input.
    ///
    /// # Errors
    ///
    /// Fails with [`WaitError::ChildAlreadyConsumed`] when the child was
    /// already reclaimed. The child is consumed even if the native wait
    /// fails.
    pub fn wait(&mut self) -> Result<ExitStatus, WaitError> {
        let process = self.consume()?;
        let status = Native::wait_process(process).map_err(WaitError::Backend)?;
        log::debug!("child {} exited with {status}", self.pid);
        Ok(status)
    }

    /// Reclaim the process if it has already exited, without blocking.
    ///
    /// Returns `Ok(None)` while the process is still running. Once a status
    /// is returned, the child is consumed.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, WaitError> {
        let process = match &self.state {
            State::Running(process) => process,
            State::Consumed => return Err(WaitError::ChildAlreadyConsumed),
        };

        let status = Native::try_wait_process(process).map_err(WaitError::Backend)?;
        if let Some(status) = status {
            log::debug!("child {} exited with {status}", self.pid);
            self.state = State::Consumed;
        }

        Ok(status)
    }

    /// Wait for the process to exit while collecting all of its output.
    ///
    /// Piped stdout and stderr are drained on separate threads. Only once
    /// those are running is stdin flushed and closed, so a child reading
    /// until end-of-input can finish even if it writes output before
    /// consuming its input. This thread then waits for the process.
    ///
    /// Input still buffered in stdin is delivered before the pipe is closed.
    /// A child that exits without reading it is not an error.
    ///
    /// Streams that were closed through the accessors contribute no output.
    ///
    /// # Errors
    ///
    /// Fails with [`WaitError::StreamInUse`] if piped stdout or stderr was
    /// taken or read from already; the child is not consumed in that case.
    /// Fails with [`WaitError::ChildAlreadyConsumed`] when the child was
    /// already reclaimed.
    pub fn wait_with_output(&mut self) -> Result<Output, WaitError> {
        if let State::Consumed = self.state {
            return Err(WaitError::ChildAlreadyConsumed);
        }
        Self::ensure_collectable(&self.stdout, Slot::Stdout)?;
        Self::ensure_collectable(&self.stderr, Slot::Stderr)?;

        let process = self.consume()?;

        let (sender, receiver) = mpsc::channel();
        let mut drains = 0;
        let mut drain_error = None;
        for reader in [self.stdout.take(), self.stderr.take()].into_iter().flatten() {
            if reader.is_closed() {
                continue;
            }

            let sender = sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("kommand-{}-{}", self.pid, reader.slot()))
                .spawn(move || drain(reader, sender));
            match spawned {
                Ok(_) => drains += 1,
                // The reader was dropped with the closure, so the child sees a
                // broken pipe instead of blocking.
                Err(error) => drain_error = Some(StreamError::Io(error)),
            }
        }
        drop(sender);

        // Flushing stdin may block until the child consumes it, which needs
        // the output drains already running.
        let stdin_closed = match self.stdin.take() {
            Some(mut stdin) if !stdin.is_closed() => stdin.close(),
            _ => Ok(()),
        };

        let waited = Native::wait_process(process).map_err(WaitError::Backend);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut received = 0;
        for (slot, result) in receiver {
            received += 1;
            match (slot, result) {
                (Slot::Stdout, Ok(bytes)) => stdout = bytes,
                (Slot::Stderr, Ok(bytes)) => stderr = bytes,
                (_, Ok(_)) => (),
                (_, Err(error)) => drain_error = drain_error.or(Some(error)),
            }
        }
        log::trace!("collected output of child {} from {received} pipes", self.pid);

        let status = waited?;
        log::debug!("child {} exited with {status}", self.pid);

        if received < drains {
            let error = io::Error::new(io::ErrorKind::Other, "output drain thread panicked");
            return Err(WaitError::Stream(StreamError::Io(error)));
        }
        if let Some(error) = drain_error {
            return Err(WaitError::Stream(error));
        }
        match stdin_closed {
            // A child may exit without reading all of its input.
            Err(StreamError::Io(error)) if error.kind() == io::ErrorKind::BrokenPipe => (),
            result => result?,
        }

        Ok(Output { status, stdout, stderr })
    }

    /// Take the process identity for a terminal operation.
    fn consume(&mut self) -> Result<Process, WaitError> {
        match mem::replace(&mut self.state, State::Consumed) {
            State::Running(process) => Ok(process),
            State::Consumed => Err(WaitError::ChildAlreadyConsumed),
        }
    }

    /// Check that an output stream can still be collected in full.
    fn ensure_collectable(endpoint: &Endpoint<ChildStdout>, slot: Slot) -> Result<(), WaitError> {
        match endpoint {
            Endpoint::Taken => Err(WaitError::StreamInUse(slot)),
            Endpoint::Owned(reader) if reader.is_used() && !reader.is_closed() => {
                Err(WaitError::StreamInUse(slot))
            },
            _ => Ok(()),
        }
    }
}

impl Debug for Child {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Child")
            .field("pid", &self.pid)
            .field("consumed", &matches!(self.state, State::Consumed))
            .finish_non_exhaustive()
    }
}

/// Read a pipe to its end and report the result.
fn drain(mut reader: ChildStdout, sender: mpsc::Sender<(Slot, Result<Vec<u8>, StreamError>)>) {
    let slot = reader.slot();
    let result = reader.read_to_end();
    log::trace!("{slot} drained");

    // The receiving side outlives every drain.
    let _ = sender.send((slot, result));
}
