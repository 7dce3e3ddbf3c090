//! Windows process backend.
//!
//! Children are created with `CreateProcessW`. Pipes are created
//! non-inheritable; the child's ends are duplicated into inheritable handles
//! only for the duration of a single `CreateProcessW` call, which is
//! serialized so concurrent spawns never pick up each other's handles.

use std::ffi::{OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::os::windows::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Mutex, PoisonError};
use std::{env, iter, mem, ptr};

use windows_sys::Win32::Foundation::{
    CloseHandle, DuplicateHandle, DUPLICATE_SAME_ACCESS, ERROR_ACCESS_DENIED, ERROR_DIRECTORY,
    ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND, HANDLE, INVALID_HANDLE_VALUE, WAIT_OBJECT_0,
    WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Console::{
    GetStdHandle, STD_ERROR_HANDLE, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows_sys::Win32::System::Pipes::CreatePipe;
use windows_sys::Win32::System::Threading::{
    CreateProcessW, GetCurrentProcess, GetExitCodeProcess, TerminateProcess,
    WaitForSingleObject, CREATE_UNICODE_ENVIRONMENT, INFINITE, PROCESS_INFORMATION,
    STARTF_USESTDHANDLES, STARTUPINFOW,
};

use crate::error::{SignalError, SpawnError};
use crate::process::SignalKind;
use crate::sys::{Backend, ChildIo, SpawnDescriptor};

/// Exit code reported by terminated processes.
const TERMINATED_EXIT_CODE: u32 = 1;

/// Serializes the window in which inheritable handles exist.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// CreateProcess backend.
pub struct WindowsBackend;

/// Owned process handle.
pub struct Process {
    handle: OwnedHandle,
    pid: u32,
}

/// One end of an anonymous pipe.
pub struct Pipe {
    file: File,
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // A closed write end is reported as EOF rather than `BrokenPipe`.
        self.file.read(buf)
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Backend for WindowsBackend {
    type Process = Process;

    fn create_pipe() -> io::Result<(Pipe, Pipe)> {
        let mut read: HANDLE = 0;
        let mut write: HANDLE = 0;
        if unsafe { CreatePipe(&mut read, &mut write, ptr::null(), 0) } == 0 {
            return Err(io::Error::last_os_error());
        }

        let read = unsafe { OwnedHandle::from_raw_handle(read as RawHandle) };
        let write = unsafe { OwnedHandle::from_raw_handle(write as RawHandle) };
        Ok((Pipe { file: File::from(read) }, Pipe { file: File::from(write) }))
    }

    fn resolve_program(program: &OsStr, path: Option<&OsStr>) -> Result<PathBuf, SpawnError> {
        let program_path = Path::new(program);
        if program_path.is_absolute() || program_path.components().count() > 1 {
            return Ok(with_exe_extension(program_path.to_path_buf()));
        }

        let search = path.map(OsString::from).or_else(|| env::var_os("PATH")).unwrap_or_default();
        env::split_paths(&search)
            .map(|dir| with_exe_extension(dir.join(program)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| SpawnError::NotFound { program: program_path.to_path_buf() })
    }

    fn spawn_process(descriptor: &SpawnDescriptor<'_>) -> Result<Process, SpawnError> {
        if let Some(cwd) = descriptor.cwd {
            if !cwd.is_dir() {
                return Err(SpawnError::InvalidWorkingDirectory {
                    path: cwd.to_path_buf(),
                    source: io::Error::from_raw_os_error(ERROR_DIRECTORY as i32),
                });
            }
        }

        let application = wide(descriptor.program.as_os_str())?;
        let mut command_line = command_line(&descriptor.argv)?;
        let environment = environment_block(&descriptor.env)?;
        let cwd = descriptor.cwd.map(|cwd| wide(cwd.as_os_str())).transpose()?;
        let null = open_null(descriptor)?;

        let _guard = SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let stdin = child_handle(&descriptor.stdin, STD_INPUT_HANDLE, null.as_ref())?;
        let stdout = child_handle(&descriptor.stdout, STD_OUTPUT_HANDLE, null.as_ref())?;
        let stderr = child_handle(&descriptor.stderr, STD_ERROR_HANDLE, null.as_ref())?;

        let mut startup: STARTUPINFOW = unsafe { mem::zeroed() };
        startup.cb = mem::size_of::<STARTUPINFOW>() as u32;
        startup.dwFlags = STARTF_USESTDHANDLES;
        startup.hStdInput = raw_handle(stdin.as_ref());
        startup.hStdOutput = raw_handle(stdout.as_ref());
        startup.hStdError = raw_handle(stderr.as_ref());

        let mut info: PROCESS_INFORMATION = unsafe { mem::zeroed() };
        let created = unsafe {
            CreateProcessW(
                application.as_ptr(),
                command_line.as_mut_ptr(),
                ptr::null(),
                ptr::null(),
                1,
                CREATE_UNICODE_ENVIRONMENT,
                environment.as_ptr().cast(),
                cwd.as_ref().map_or(ptr::null(), |cwd| cwd.as_ptr()),
                &startup,
                &mut info,
            )
        };

        // The inheritable duplicates now live in the child, if anywhere.
        drop((stdin, stdout, stderr));

        if created == 0 {
            return Err(spawn_failure(io::Error::last_os_error(), descriptor));
        }

        unsafe { CloseHandle(info.hThread) };
        let handle = unsafe { OwnedHandle::from_raw_handle(info.hProcess as RawHandle) };

        Ok(Process { handle, pid: info.dwProcessId })
    }

    fn process_id(process: &Process) -> u32 {
        process.pid
    }

    fn wait_process(process: Process) -> io::Result<ExitStatus> {
        match unsafe { WaitForSingleObject(raw_handle(Some(&process.handle)), INFINITE) } {
            WAIT_OBJECT_0 => exit_status(&process),
            _ => Err(io::Error::last_os_error()),
        }
    }

    fn try_wait_process(process: &Process) -> io::Result<Option<ExitStatus>> {
        match unsafe { WaitForSingleObject(raw_handle(Some(&process.handle)), 0) } {
            WAIT_OBJECT_0 => exit_status(process).map(Some),
            WAIT_TIMEOUT => Ok(None),
            _ => Err(io::Error::last_os_error()),
        }
    }

    fn signal_process(process: &Process, _kind: SignalKind) -> Result<(), SignalError> {
        let handle = raw_handle(Some(&process.handle));
        if unsafe { TerminateProcess(handle, TERMINATED_EXIT_CODE) } != 0 {
            return Ok(());
        }

        let error = io::Error::last_os_error();
        let exited = unsafe { WaitForSingleObject(handle, 0) } == WAIT_OBJECT_0;
        if exited && error.raw_os_error() == Some(ERROR_ACCESS_DENIED as i32) {
            Err(SignalError::ProcessExited)
        } else {
            Err(SignalError::Delivery(error))
        }
    }
}

fn exit_status(process: &Process) -> io::Result<ExitStatus> {
    let mut code = 0;
    if unsafe { GetExitCodeProcess(raw_handle(Some(&process.handle)), &mut code) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ExitStatus::from_raw(code))
}

/// Map a `CreateProcessW` failure to the spawn error taxonomy.
fn spawn_failure(error: io::Error, descriptor: &SpawnDescriptor<'_>) -> SpawnError {
    let program = descriptor.program.clone();
    match error.raw_os_error().map(|code| code as u32) {
        Some(ERROR_FILE_NOT_FOUND) | Some(ERROR_PATH_NOT_FOUND) => SpawnError::NotFound { program },
        Some(ERROR_ACCESS_DENIED) => SpawnError::PermissionDenied { program, source: error },
        Some(ERROR_DIRECTORY) => SpawnError::InvalidWorkingDirectory {
            path: descriptor.cwd.map(Path::to_path_buf).unwrap_or_default(),
            source: error,
        },
        _ => SpawnError::Backend(error),
    }
}

/// Inheritable handle for one of the child's standard streams.
fn child_handle(
    io: &ChildIo,
    std_handle: STD_HANDLE,
    null: Option<&File>,
) -> Result<Option<OwnedHandle>, SpawnError> {
    let source = match (io, null) {
        (ChildIo::Inherit, _) => {
            let handle = unsafe { GetStdHandle(std_handle) };
            // Detached parents have no handle to share.
            if handle == 0 || handle == INVALID_HANDLE_VALUE {
                return Ok(None);
            }
            handle
        },
        (ChildIo::Null, Some(null)) => null.as_raw_handle() as HANDLE,
        (ChildIo::Null, None) => return Ok(None),
        (ChildIo::Pipe(pipe), _) => pipe.file.as_raw_handle() as HANDLE,
    };

    inheritable(source).map(Some).map_err(SpawnError::Backend)
}

fn inheritable(handle: HANDLE) -> io::Result<OwnedHandle> {
    let mut duplicate: HANDLE = 0;
    let duplicated = unsafe {
        let process = GetCurrentProcess();
        DuplicateHandle(process, handle, process, &mut duplicate, 0, 1, DUPLICATE_SAME_ACCESS)
    };
    if duplicated == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedHandle::from_raw_handle(duplicate as RawHandle) })
}

/// Open the `NUL` device when any stream needs it.
fn open_null(descriptor: &SpawnDescriptor<'_>) -> Result<Option<File>, SpawnError> {
    let ios = [&descriptor.stdin, &descriptor.stdout, &descriptor.stderr];
    if !ios.iter().any(|io| matches!(io, ChildIo::Null)) {
        return Ok(None);
    }

    let file = OpenOptions::new().read(true).write(true).open("NUL");
    file.map(Some).map_err(SpawnError::Backend)
}

fn raw_handle(handle: Option<&OwnedHandle>) -> HANDLE {
    handle.map_or(0, |handle| handle.as_raw_handle() as HANDLE)
}

fn with_exe_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("exe")
    }
}

/// NUL-terminated UTF-16 string.
fn wide(value: &OsStr) -> Result<Vec<u16>, SpawnError> {
    let mut wide: Vec<u16> = value.encode_wide().collect();
    if wide.contains(&0) {
        return Err(nul_error(value));
    }
    wide.push(0);
    Ok(wide)
}

/// Join arguments into a command line the MSVC runtime splits back apart.
fn command_line(argv: &[&OsStr]) -> Result<Vec<u16>, SpawnError> {
    let mut line = Vec::new();
    for (index, arg) in argv.iter().enumerate() {
        if index > 0 {
            line.push(b' ' as u16);
        }
        append_arg(&mut line, arg)?;
    }
    line.push(0);
    Ok(line)
}

fn append_arg(line: &mut Vec<u16>, value: &OsStr) -> Result<(), SpawnError> {
    let arg: Vec<u16> = value.encode_wide().collect();
    if arg.contains(&0) {
        return Err(nul_error(value));
    }

    let needs_quotes = arg.is_empty()
        || arg.iter().any(|&c| c == b' ' as u16 || c == b'\t' as u16 || c == b'"' as u16);
    if !needs_quotes {
        line.extend(arg);
        return Ok(());
    }

    line.push(b'"' as u16);
    let mut backslashes = 0;
    for c in arg {
        if c == b'\\' as u16 {
            backslashes += 1;
        } else {
            // Backslashes only escape when followed by a quote.
            if c == b'"' as u16 {
                line.extend(iter::repeat(b'\\' as u16).take(backslashes + 1));
            }
            backslashes = 0;
        }
        line.push(c);
    }
    // Double trailing backslashes so they don't escape the closing quote.
    line.extend(iter::repeat(b'\\' as u16).take(backslashes));
    line.push(b'"' as u16);

    Ok(())
}

/// Sorted, double-NUL-terminated `KEY=VALUE` block.
fn environment_block(env: &[(OsString, OsString)]) -> Result<Vec<u16>, SpawnError> {
    let mut vars: Vec<_> = env.iter().collect();
    vars.sort_by_cached_key(|(key, _)| key.to_string_lossy().to_uppercase());

    let mut block = Vec::new();
    for (key, value) in vars {
        if key.is_empty() || key.encode_wide().skip(1).any(|c| c == b'=' as u16) {
            let message = format!("invalid environment variable name {key:?}");
            return Err(SpawnError::Backend(io::Error::new(io::ErrorKind::InvalidInput, message)));
        }
        let mut pair = key.clone();
        pair.push("=");
        pair.push(value);
        block.extend(wide(&pair)?);
    }

    // An empty block still needs its terminating pair.
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);

    Ok(block)
}

fn nul_error(value: &OsStr) -> SpawnError {
    let message = format!("nul byte in {value:?}");
    SpawnError::Backend(io::Error::new(io::ErrorKind::InvalidInput, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(args: &[&str]) -> String {
        let args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        let mut line = command_line(&args).unwrap();
        line.pop();
        String::from_utf16(&line).unwrap()
    }

    #[test]
    fn plain_arguments() {
        assert_eq!(line(&["prog", "a", "b"]), "prog a b");
    }

    #[test]
    fn quoted_arguments() {
        assert_eq!(line(&["prog", "a b", ""]), r#"prog "a b" """#);
        assert_eq!(line(&["prog", r#"say "hi""#]), r#"prog "say \"hi\"""#);
        assert_eq!(line(&["prog", r"dir\ end\"]), r#"prog "dir\ end\\""#);
    }

    #[test]
    fn block_is_double_terminated() {
        let block = environment_block(&[]).unwrap();
        assert_eq!(block, vec![0, 0]);

        let env = vec![("b".into(), "2".into()), ("A".into(), "1".into())];
        let block = environment_block(&env).unwrap();
        assert_eq!(String::from_utf16(&block).unwrap(), "A=1\0b=2\0\0");
    }
}
