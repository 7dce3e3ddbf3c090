//! Unix process backend.
//!
//! Children are created with `fork` followed by `execve`. A close-on-exec
//! status pipe carries the failing stage and `errno` back to the parent when
//! the child cannot reach `execve`; a successful exec closes the pipe without
//! writing to it.

use std::ffi::{CStr, CString, OsStr, OsString};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::{env, ptr};

use libc::{c_char, c_int};
use rustix::fs::{Access, Mode, OFlags};
use rustix::io::Errno;
use rustix::process::{Pid, Signal};

use crate::error::{SignalError, SpawnError};
use crate::process::SignalKind;
use crate::sys::{Backend, ChildIo, SpawnDescriptor};

/// Search path used when the child environment has no `PATH`.
const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Child failed while redirecting its standard streams.
const STAGE_DUP2: u32 = 1;
/// Child failed to enter its working directory.
const STAGE_CHDIR: u32 = 2;
/// Child failed to execute the program.
const STAGE_EXEC: u32 = 3;

/// Size of a status pipe message: stage followed by errno.
const STATUS_LEN: usize = 8;

/// Fork/exec process backend.
pub struct UnixBackend;

/// Live child process id.
pub struct Process {
    pid: Pid,
}

/// One end of a close-on-exec pipe.
pub struct Pipe {
    fd: OwnedFd,
}

impl Pipe {
    fn new(fd: OwnedFd) -> io::Result<Self> {
        Ok(Self { fd: above_stdio(fd)? })
    }
}

impl AsFd for Pipe {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match rustix::io::read(&self.fd, buf) {
                Err(Errno::INTR) => continue,
                result => return result.map_err(io::Error::from),
            }
        }
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match rustix::io::write(&self.fd, buf) {
                Err(Errno::INTR) => continue,
                result => return result.map_err(io::Error::from),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Backend for UnixBackend {
    type Process = Process;

    fn create_pipe() -> io::Result<(Pipe, Pipe)> {
        let (read, write) = cloexec_pipe()?;
        Ok((Pipe::new(read)?, Pipe::new(write)?))
    }

    fn resolve_program(program: &OsStr, path: Option<&OsStr>) -> Result<PathBuf, SpawnError> {
        // Explicit paths are left for `execve` to judge.
        if program.as_bytes().contains(&b'/') {
            return Ok(PathBuf::from(program));
        }

        let search = path.unwrap_or_else(|| OsStr::new(DEFAULT_PATH));
        let mut denied = None;
        for dir in env::split_paths(search) {
            let candidate = dir.join(program);
            match rustix::fs::access(candidate.as_path(), Access::EXEC_OK) {
                Ok(()) if candidate.is_file() => return Ok(candidate),
                Err(Errno::ACCESS) if denied.is_none() && candidate.is_file() => {
                    denied = Some(candidate);
                },
                _ => (),
            }
        }

        match denied {
            Some(program) => {
                Err(SpawnError::PermissionDenied { program, source: Errno::ACCESS.into() })
            },
            None => Err(SpawnError::NotFound { program: PathBuf::from(program) }),
        }
    }

    fn spawn_process(descriptor: &SpawnDescriptor<'_>) -> Result<Process, SpawnError> {
        // Everything the child needs is allocated before forking, since only
        // async-signal-safe calls are allowed in between fork and exec.
        let program = cstring(descriptor.program.as_os_str())?;
        let argv = descriptor.argv.iter().map(|arg| cstring(arg)).collect::<Result<Vec<_>, _>>()?;
        let envp = descriptor
            .env
            .iter()
            .map(|(key, value)| {
                let mut pair = OsString::with_capacity(key.len() + value.len() + 1);
                pair.push(key);
                pair.push("=");
                pair.push(value);
                cstring(&pair)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let cwd = descriptor.cwd.map(|cwd| cstring(cwd.as_os_str())).transpose()?;
        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        let null = open_null(descriptor)?;
        let redirects = [
            redirect(&descriptor.stdin, null.as_ref()),
            redirect(&descriptor.stdout, null.as_ref()),
            redirect(&descriptor.stderr, null.as_ref()),
        ];

        let (mut status_read, status_write) =
            Self::create_pipe().map_err(SpawnError::Backend)?;

        let exec = Exec {
            program: &program,
            argv: &argv_ptrs,
            envp: &envp_ptrs,
            cwd: cwd.as_deref(),
            redirects,
            status: status_write.fd.as_raw_fd(),
        };

        let pid = unsafe { libc::fork() };
        if pid == 0 {
            unsafe { exec.run() }
        }
        if pid == -1 {
            return Err(SpawnError::Backend(io::Error::last_os_error()));
        }

        // Our copy of the write end must be gone to see EOF on exec.
        drop(status_write);

        let pid = Pid::from_raw(pid).ok_or_else(|| {
            SpawnError::Backend(io::Error::new(io::ErrorKind::Other, "fork returned invalid pid"))
        })?;

        match read_status(&mut status_read) {
            Ok(None) => Ok(Process { pid }),
            Ok(Some((stage, errno))) => {
                reap_failed(pid);
                Err(spawn_failure(stage, errno, descriptor))
            },
            Err(error) => {
                reap_failed(pid);
                Err(SpawnError::Backend(error))
            },
        }
    }

    fn process_id(process: &Process) -> u32 {
        process.pid.as_raw_nonzero().get() as u32
    }

    fn wait_process(process: Process) -> io::Result<ExitStatus> {
        waitpid(process.pid, 0)?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "waitpid returned without a status")
        })
    }

    fn try_wait_process(process: &Process) -> io::Result<Option<ExitStatus>> {
        waitpid(process.pid, libc::WNOHANG)
    }

    fn signal_process(process: &Process, kind: SignalKind) -> Result<(), SignalError> {
        let signal = match kind {
            SignalKind::Kill => Signal::Kill,
            SignalKind::Terminate => Signal::Term,
        };

        match rustix::process::kill_process(process.pid, signal) {
            Ok(()) => Ok(()),
            Err(Errno::SRCH) => Err(SignalError::ProcessExited),
            Err(error) => Err(SignalError::Delivery(error.into())),
        }
    }
}

/// State borrowed by the forked child.
struct Exec<'a> {
    program: &'a CString,
    argv: &'a [*const c_char],
    envp: &'a [*const c_char],
    cwd: Option<&'a CStr>,
    redirects: [Option<RawFd>; 3],
    status: RawFd,
}

impl Exec<'_> {
    /// Replace the forked child with the target program.
    ///
    /// # Safety
    ///
    /// Must only be called in the child right after `fork`.
    unsafe fn run(&self) -> ! {
        // Rust ignores SIGPIPE; programs expect the default disposition.
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);

        for (target, source) in self.redirects.iter().enumerate() {
            if let Some(source) = *source {
                if libc::dup2(source, target as c_int) == -1 {
                    self.fail(STAGE_DUP2);
                }
            }
        }

        if let Some(cwd) = self.cwd {
            if libc::chdir(cwd.as_ptr()) == -1 {
                self.fail(STAGE_CHDIR);
            }
        }

        libc::execve(self.program.as_ptr(), self.argv.as_ptr(), self.envp.as_ptr());
        self.fail(STAGE_EXEC)
    }

    /// Report the current `errno` to the parent and exit.
    unsafe fn fail(&self, stage: u32) -> ! {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);

        let mut message = [0; STATUS_LEN];
        message[..4].copy_from_slice(&stage.to_le_bytes());
        message[4..].copy_from_slice(&errno.to_le_bytes());
        libc::write(self.status, message.as_ptr().cast(), message.len());

        libc::_exit(127)
    }
}

/// Read the child's exec status.
///
/// Returns `None` once the program was executed successfully.
fn read_status(pipe: &mut Pipe) -> io::Result<Option<(u32, i32)>> {
    let mut message = [0; STATUS_LEN];
    let mut filled = 0;
    while filled < STATUS_LEN {
        match pipe.read(&mut message[filled..])? {
            0 => break,
            read => filled += read,
        }
    }

    match filled {
        0 => Ok(None),
        STATUS_LEN => {
            let mut stage = [0; 4];
            let mut errno = [0; 4];
            stage.copy_from_slice(&message[..4]);
            errno.copy_from_slice(&message[4..]);
            Ok(Some((u32::from_le_bytes(stage), i32::from_le_bytes(errno))))
        },
        _ => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated exec status")),
    }
}

/// Map a failed exec stage to the spawn error taxonomy.
fn spawn_failure(stage: u32, errno: i32, descriptor: &SpawnDescriptor<'_>) -> SpawnError {
    let source = io::Error::from_raw_os_error(errno);
    match stage {
        STAGE_CHDIR => SpawnError::InvalidWorkingDirectory {
            path: descriptor.cwd.map(Path::to_path_buf).unwrap_or_default(),
            source,
        },
        STAGE_EXEC if errno == libc::ENOENT || errno == libc::ENOTDIR => {
            SpawnError::NotFound { program: descriptor.program.clone() }
        },
        STAGE_EXEC if errno == libc::EACCES || errno == libc::EPERM => {
            SpawnError::PermissionDenied { program: descriptor.program.clone(), source }
        },
        _ => SpawnError::Backend(source),
    }
}

/// Collect a child that exited before reaching `execve`.
fn reap_failed(pid: Pid) {
    if let Err(error) = waitpid(pid, 0) {
        log::trace!("could not reap failed child {}: {error}", pid.as_raw_nonzero());
    }
}

fn waitpid(pid: Pid, options: c_int) -> io::Result<Option<ExitStatus>> {
    loop {
        let mut status: c_int = 0;
        match unsafe { libc::waitpid(pid.as_raw_nonzero().get(), &mut status, options) } {
            -1 => {
                let error = io::Error::last_os_error();
                if error.kind() != io::ErrorKind::Interrupted {
                    return Err(error);
                }
            },
            0 => return Ok(None),
            _ => return Ok(Some(ExitStatus::from_raw(status))),
        }
    }
}

/// Open `/dev/null` when any stream needs it.
fn open_null(descriptor: &SpawnDescriptor<'_>) -> Result<Option<OwnedFd>, SpawnError> {
    let ios = [&descriptor.stdin, &descriptor.stdout, &descriptor.stderr];
    if !ios.iter().any(|io| matches!(io, ChildIo::Null)) {
        return Ok(None);
    }

    let fd = rustix::fs::open("/dev/null", OFlags::RDWR | OFlags::CLOEXEC, Mode::empty())
        .map_err(|error| SpawnError::Backend(error.into()))?;
    above_stdio(fd).map(Some).map_err(SpawnError::Backend)
}

/// Descriptor to install as one of the child's standard streams.
fn redirect(io: &ChildIo, null: Option<&OwnedFd>) -> Option<RawFd> {
    match io {
        ChildIo::Inherit => None,
        ChildIo::Null => null.map(AsRawFd::as_raw_fd),
        ChildIo::Pipe(pipe) => Some(pipe.fd.as_raw_fd()),
    }
}

/// Move a descriptor out of the standard stream range.
///
/// A parent with closed standard streams hands out 0..=2 for new descriptors,
/// which would be clobbered by the child's own `dup2` calls.
fn above_stdio(fd: OwnedFd) -> io::Result<OwnedFd> {
    if fd.as_raw_fd() > libc::STDERR_FILENO {
        return Ok(fd);
    }
    Ok(rustix::io::fcntl_dupfd_cloexec(&fd, libc::STDERR_FILENO + 1)?)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    Ok(rustix::pipe::pipe_with(rustix::pipe::PipeFlags::CLOEXEC)?)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (read, write) = rustix::pipe::pipe()?;
    rustix::io::fcntl_setfd(&read, rustix::io::FdFlags::CLOEXEC)?;
    rustix::io::fcntl_setfd(&write, rustix::io::FdFlags::CLOEXEC)?;
    Ok((read, write))
}

fn cstring(value: &OsStr) -> Result<CString, SpawnError> {
    CString::new(value.as_bytes().to_vec()).map_err(|_| {
        let message = format!("nul byte in {value:?}");
        SpawnError::Backend(io::Error::new(io::ErrorKind::InvalidInput, message))
    })
}

fn null_terminated(values: &[CString]) -> Vec<*const c_char> {
    values.iter().map(|value| value.as_ptr()).chain(Some(ptr::null())).collect()
}

#[cfg(test)]
mod tests {
    use std::os::unix::ffi::OsStringExt;

    use super::*;

    #[test]
    fn resolve_explicit_path() {
        let program = UnixBackend::resolve_program(OsStr::new("./missing"), None).unwrap();
        assert_eq!(program, PathBuf::from("./missing"));
    }

    #[test]
    fn resolve_from_path() {
        let program = UnixBackend::resolve_program(OsStr::new("sh"), None).unwrap();
        assert!(program.is_absolute());
        assert!(program.ends_with("sh"));
    }

    #[test]
    fn resolve_missing() {
        let path = OsStr::new("/nonexistent-kommand-dir");
        let result = UnixBackend::resolve_program(OsStr::new("sh"), Some(path));
        assert!(matches!(result, Err(SpawnError::NotFound { .. })));
    }

    #[test]
    fn pipe_above_stdio() {
        let (read, write) = UnixBackend::create_pipe().unwrap();
        assert!(read.fd.as_raw_fd() > 2);
        assert!(write.fd.as_raw_fd() > 2);
    }

    #[test]
    fn nul_in_argument() {
        let value = OsString::from_vec(b"a\0b".to_vec());
        assert!(matches!(cstring(&value), Err(SpawnError::Backend(_))));
    }
}
