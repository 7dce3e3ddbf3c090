//! Kommand child processes.
//!
//! This crate provides a single blocking API for spawning child processes on
//! Unix and Windows, exchanging data with them over pipes, and waiting for or
//! ending them exactly once.
//!
//! # Example
//!
//! ```no_run
//! use kommand::process::{Command, Stdio};
//!
//! let mut child = Command::new("cat")
//!     .stdin(Stdio::piped())
//!     .stdout(Stdio::piped())
//!     .spawn()
//!     .unwrap();
//!
//! // Round-trip a line through the child.
//! let stdin = child.stdin().unwrap();
//! stdin.write_line("Hello, Kommand!").unwrap();
//! stdin.flush().unwrap();
//! let line = child.stdout().unwrap().read_line().unwrap();
//! assert_eq!(line.as_deref(), Some("Hello, Kommand!"));
//!
//! // Closing stdin lets `cat` exit.
//! child.stdin().unwrap().close().unwrap();
//! assert!(child.wait().unwrap().success());
//! ```

pub use crate::error::{Error, Result};
pub use crate::process::{Child, Command, Output, Stdio};

pub mod error;
pub mod process;
mod sys;
