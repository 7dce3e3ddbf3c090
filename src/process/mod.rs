//! Portable process API.

use std::fmt::{self, Display, Formatter};

mod child;
mod command;
mod spawn;
mod stream;

pub use std::process::ExitStatus;

pub use crate::process::child::{Child, Output, SignalKind};
pub use crate::process::command::{Command, Stdio};
pub use crate::process::stream::{
    BufferedReader, BufferedWriter, ChildStderr, ChildStdin, ChildStdout, Lines,
};

/// One of a process's three standard streams.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Stdin,
    Stdout,
    Stderr,
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}
