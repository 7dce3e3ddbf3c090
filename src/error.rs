//! Process execution errors.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use crate::process::Slot;

/// Result type defaulting to the crate's umbrella [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to launch a child process.
///
/// When spawning fails no [`Child`] is returned, and every pipe endpoint that
/// was created along the way has already been closed.
///
/// [`Child`]: crate::process::Child
#[derive(Debug)]
pub enum SpawnError {
    /// The program could not be found.
    NotFound { program: PathBuf },

    /// The program exists but may not be executed by the current user.
    PermissionDenied { program: PathBuf, source: io::Error },

    /// The child could not change into its working directory.
    InvalidWorkingDirectory { path: PathBuf, source: io::Error },

    /// An OS pipe for one of the standard streams could not be created.
    PipeCreation { slot: Slot, source: io::Error },

    /// The native process creation primitive failed.
    Backend(io::Error),
}

impl StdError for SpawnError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::PermissionDenied { source, .. }
            | Self::InvalidWorkingDirectory { source, .. }
            | Self::PipeCreation { source, .. }
            | Self::Backend(source) => Some(source),
        }
    }
}

impl Display for SpawnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { program } => {
                write!(f, "executable not found: {}", program.display())
            },
            Self::PermissionDenied { program, .. } => {
                write!(f, "permission denied executing {}", program.display())
            },
            Self::InvalidWorkingDirectory { path, source } => {
                write!(f, "invalid working directory {}: {source}", path.display())
            },
            Self::PipeCreation { slot, source } => {
                write!(f, "failed to create {slot} pipe: {source}")
            },
            Self::Backend(error) => write!(f, "failed to spawn process: {error}"),
        }
    }
}

/// Failure to wait for a child process.
#[derive(Debug)]
pub enum WaitError {
    /// The native wait primitive failed.
    Backend(io::Error),

    /// A terminal operation was already performed on this child.
    ChildAlreadyConsumed,

    /// An output stream needed by `wait_with_output` was taken or already read
    /// from through the child's accessors.
    StreamInUse(Slot),

    /// Reading or closing one of the child's pipes failed.
    Stream(StreamError),
}

impl StdError for WaitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Backend(error) => Some(error),
            Self::Stream(error) => Some(error),
            Self::ChildAlreadyConsumed | Self::StreamInUse(_) => None,
        }
    }
}

impl Display for WaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(error) => write!(f, "failed to wait on child: {error}"),
            Self::ChildAlreadyConsumed => write!(f, "child has been consumed"),
            Self::StreamInUse(slot) => {
                write!(f, "{slot} was already read from or taken and cannot be collected")
            },
            Self::Stream(error) => write!(f, "failed to collect child output: {error}"),
        }
    }
}

impl From<StreamError> for WaitError {
    fn from(error: StreamError) -> Self {
        Self::Stream(error)
    }
}

/// Failure of an operation on a buffered pipe stream.
#[derive(Debug)]
pub enum StreamError {
    /// The stream's descriptor was already released.
    Closed,

    /// Underlying pipe I/O error.
    Io(io::Error),
}

impl StreamError {
    /// Whether this is the `Closed` condition.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Closed => None,
            Self::Io(error) => Some(error),
        }
    }
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "stream closed"),
            Self::Io(error) => write!(f, "pipe i/o error: {error}"),
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(error: io::Error) -> Self {
        // Unwrap errors that were bridged through `std::io` traits.
        if error.get_ref().map_or(false, |inner| inner.is::<StreamError>()) {
            return Self::Closed;
        }
        Self::Io(error)
    }
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Io(error) => error,
            closed @ StreamError::Closed => io::Error::new(io::ErrorKind::Other, closed),
        }
    }
}

/// Failure to deliver a signal to a child process.
#[derive(Debug)]
pub enum SignalError {
    /// The process has already exited and been reaped.
    ProcessExited,

    /// The OS refused to deliver the signal.
    Delivery(io::Error),
}

impl StdError for SignalError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::ProcessExited => None,
            Self::Delivery(error) => Some(error),
        }
    }
}

impl Display for SignalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessExited => write!(f, "process has already exited"),
            Self::Delivery(error) => write!(f, "failed to signal process: {error}"),
        }
    }
}

/// Any kommand error.
#[derive(Debug)]
pub enum Error {
    Spawn(SpawnError),
    Wait(WaitError),
    Stream(StreamError),
    Signal(SignalError),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Spawn(error) => Some(error),
            Self::Wait(error) => Some(error),
            Self::Stream(error) => Some(error),
            Self::Signal(error) => Some(error),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(error) => error.fmt(f),
            Self::Wait(error) => error.fmt(f),
            Self::Stream(error) => error.fmt(f),
            Self::Signal(error) => error.fmt(f),
        }
    }
}

impl From<SpawnError> for Error {
    fn from(error: SpawnError) -> Self {
        Self::Spawn(error)
    }
}

impl From<WaitError> for Error {
    fn from(error: WaitError) -> Self {
        Self::Wait(error)
    }
}

impl From<StreamError> for Error {
    fn from(error: StreamError) -> Self {
        Self::Stream(error)
    }
}

impl From<SignalError> for Error {
    fn from(error: SignalError) -> Self {
        Self::Signal(error)
    }
}
