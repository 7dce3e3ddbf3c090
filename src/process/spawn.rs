//! Turning a [`Command`] into a running [`Child`].

use crate::error::SpawnError;
use crate::process::command::{self, StdioType};
use crate::process::stream::{BufferedReader, BufferedWriter};
use crate::process::{Child, Command, Slot, Stdio};
use crate::sys::{Backend, ChildIo, Native, Pipe, SpawnDescriptor};

/// Spawn `command` through the native backend.
///
/// Pipe ends created before a failure are closed on return, so a failed spawn
/// leaks no descriptors.
pub(crate) fn spawn(command: &Command) -> Result<Child, SpawnError> {
    let env = command.capture_env();
    let program = Native::resolve_program(command.get_program(), command::path_var(&env))?;

    let (stdin, parent_stdin) = setup_stdio(command.stdin, Slot::Stdin)?;
    let (stdout, parent_stdout) = setup_stdio(command.stdout, Slot::Stdout)?;
    let (stderr, parent_stderr) = setup_stdio(command.stderr, Slot::Stderr)?;

    let mut argv = Vec::with_capacity(command.get_args().len() + 1);
    argv.push(command.get_program());
    argv.extend(command.get_args());

    let descriptor = SpawnDescriptor {
        program,
        argv,
        env,
        cwd: command.get_current_dir(),
        stdin,
        stdout,
        stderr,
    };
    let process = Native::spawn_process(&descriptor)?;

    // Close the child's pipe ends, otherwise the parent holds a writer on the
    // child's stdout and never sees end-of-stream.
    drop(descriptor);

    log::debug!(
        "spawned {:?} as process {}",
        command.get_program(),
        Native::process_id(&process)
    );

    Ok(Child::new(
        process,
        parent_stdin.map(BufferedWriter::new),
        parent_stdout.map(|pipe| BufferedReader::new(pipe, Slot::Stdout)),
        parent_stderr.map(|pipe| BufferedReader::new(pipe, Slot::Stderr)),
    ))
}

/// Prepare one standard stream.
///
/// Returns what the child is connected to, plus the parent's pipe end when
/// the stream is piped.
fn setup_stdio(stdio: Stdio, slot: Slot) -> Result<(ChildIo, Option<Pipe>), SpawnError> {
    match stdio.ty {
        StdioType::Inherit => Ok((ChildIo::Inherit, None)),
        StdioType::Null => Ok((ChildIo::Null, None)),
        StdioType::Piped => {
            let (read, write) =
                Native::create_pipe().map_err(|source| SpawnError::PipeCreation { slot, source })?;
            log::trace!("created {slot} pipe");

            match slot {
                Slot::Stdin => Ok((ChildIo::Pipe(read), Some(write))),
                Slot::Stdout | Slot::Stderr => Ok((ChildIo::Pipe(write), Some(read))),
            }
        },
    }
}
