//! Native process backends.
//!
//! Every supported OS family provides one [`Backend`] implementation; the
//! portable layer in [`crate::process`] only talks to the [`Native`] alias.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::error::{SignalError, SpawnError};
use crate::process::SignalKind;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Backend of the current platform.
#[cfg(unix)]
pub(crate) type Native = unix::UnixBackend;

/// Backend of the current platform.
#[cfg(windows)]
pub(crate) type Native = windows::WindowsBackend;

/// Raw pipe endpoint owned by the parent.
#[cfg(unix)]
pub(crate) type Pipe = unix::Pipe;

/// Raw pipe endpoint owned by the parent.
#[cfg(windows)]
pub(crate) type Pipe = windows::Pipe;

/// Child process identity.
pub(crate) type Process = <Native as Backend>::Process;

/// Source or sink a child's standard stream is connected to.
pub(crate) enum ChildIo {
    /// Share the parent's stream.
    Inherit,
    /// Connect to the null device.
    Null,
    /// Connect to the child end of a pipe.
    Pipe(Pipe),
}

/// Fully resolved description of a process to create.
pub(crate) struct SpawnDescriptor<'a> {
    /// Program path after lookup.
    pub program: PathBuf,
    /// Argument vector, including the program name as `argv[0]`.
    pub argv: Vec<&'a OsStr>,
    /// Complete child environment.
    pub env: Vec<(OsString, OsString)>,
    pub cwd: Option<&'a Path>,
    pub stdin: ChildIo,
    pub stdout: ChildIo,
    pub stderr: ChildIo,
}

/// Primitive operations of a native process model.
///
/// Releasing a descriptor or process handle is never an explicit call: all
/// resources are owned types that close on drop.
pub(crate) trait Backend {
    /// Owned process identity.
    type Process;

    /// Create a pipe, returning its `(read, write)` ends.
    ///
    /// Both ends are private to the parent until handed to a child through a
    /// [`SpawnDescriptor`].
    fn create_pipe() -> io::Result<(Pipe, Pipe)>;

    /// Find the executable that `program` refers to.
    ///
    /// `path` is the `PATH` the child will see.
    fn resolve_program(program: &OsStr, path: Option<&OsStr>) -> Result<PathBuf, SpawnError>;

    /// Create the process.
    ///
    /// The child ends in `descriptor` stay owned by the caller, who must drop
    /// them once this returns.
    fn spawn_process(descriptor: &SpawnDescriptor<'_>) -> Result<Self::Process, SpawnError>;

    /// OS-assigned process identifier.
    fn process_id(process: &Self::Process) -> u32;

    /// Block until the process exits and release its identity.
    fn wait_process(process: Self::Process) -> io::Result<ExitStatus>;

    /// Collect the exit status if the process has already exited.
    fn try_wait_process(process: &Self::Process) -> io::Result<Option<ExitStatus>>;

    /// Ask the process to stop.
    fn signal_process(process: &Self::Process, kind: SignalKind) -> Result<(), SignalError>;
}
