//! Buffered pipe streams.
//!
//! A [`BufferedWriter`] feeds a child's stdin, a [`BufferedReader`] collects
//! its stdout or stderr. Both own their pipe end exclusively; closing a stream
//! releases the end immediately and turns every later operation into
//! [`StreamError::Closed`].

use std::borrow::BorrowMut;
use std::fmt::{self, Debug, Formatter};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::iter::FusedIterator;

use crate::error::StreamError;
use crate::process::Slot;
use crate::sys::Pipe;

/// Line terminator appended by [`BufferedWriter::write_line`].
const LINE_TERMINATOR: &[u8] = b"\n";

/// Handle for writing to a child's standard input.
pub type ChildStdin = BufferedWriter;

/// Handle for reading a child's standard output.
pub type ChildStdout = BufferedReader;

/// Handle for reading a child's standard error.
pub type ChildStderr = BufferedReader;

/// Buffered writer over the parent end of a pipe.
///
/// Data is only guaranteed to reach the child after [`flush`] or [`close`].
/// Dropping the writer flushes on a best-effort basis and closes the pipe, so
/// the child observes end-of-input.
///
/// [`flush`]: Self::flush
/// [`close`]: Self::close
pub struct BufferedWriter {
    inner: Option<BufWriter<Pipe>>,
}

impl BufferedWriter {
    pub(crate) fn new(pipe: Pipe) -> Self {
        Self { inner: Some(BufWriter::new(pipe)) }
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.writer()?.write_all(bytes)?;
        Ok(())
    }

    /// Append `line` followed by a line terminator.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kommand::process::{Command, Stdio};
    ///
    /// let mut child = Command::new("cat").stdin(Stdio::piped()).spawn().unwrap();
    /// let stdin = child.stdin().unwrap();
    /// stdin.write_line("hello").unwrap();
    /// stdin.flush().unwrap();
    /// ```
    pub fn write_line(&mut self, line: &str) -> Result<(), StreamError> {
        let writer = self.writer()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(LINE_TERMINATOR)?;
        Ok(())
    }

    /// Push all buffered bytes into the pipe.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.writer()?.flush()?;
        Ok(())
    }

    /// Flush and release the pipe.
    ///
    /// The pipe is released even when the final flush fails.
    pub fn close(&mut self) -> Result<(), StreamError> {
        let writer = self.inner.take().ok_or(StreamError::Closed)?;
        match writer.into_inner() {
            Ok(pipe) => {
                drop(pipe);
                Ok(())
            },
            Err(error) => {
                // Drop the writer without retrying the flush.
                let (error, writer) = error.into_parts();
                drop(writer.into_parts());
                Err(error.into())
            },
        }
    }

    /// Whether the pipe was already released.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn writer(&mut self) -> Result<&mut BufWriter<Pipe>, StreamError> {
        self.inner.as_mut().ok_or(StreamError::Closed)
    }
}

impl Write for BufferedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.writer()?.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(BufferedWriter::flush(self)?)
    }
}

impl Debug for BufferedWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedWriter").field("closed", &self.is_closed()).finish()
    }
}

/// Buffered, line-oriented reader over the parent end of a pipe.
///
/// Reads block until a full line or end-of-stream is available.
pub struct BufferedReader {
    inner: Option<BufReader<Pipe>>,
    slot: Slot,
    used: bool,
}

impl BufferedReader {
    pub(crate) fn new(pipe: Pipe, slot: Slot) -> Self {
        Self { inner: Some(BufReader::new(pipe)), slot, used: false }
    }

    /// Read the next line, without its terminator.
    ///
    /// Both `\n` and `\r\n` terminate a line, a final line may lack a
    /// terminator. Returns `None` at end-of-stream. Invalid UTF-8 is replaced
    /// with `U+FFFD`.
    pub fn read_line(&mut self) -> Result<Option<String>, StreamError> {
        let mut line = Vec::new();
        if self.reader()?.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        Ok(Some(into_text(line)))
    }

    /// Iterate over the remaining lines.
    ///
    /// The iterator ends for good at end-of-stream or after yielding the first
    /// error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kommand::process::{Command, Stdio};
    ///
    /// let mut child = Command::new("ls").stdout(Stdio::piped()).spawn().unwrap();
    /// for line in child.stdout().unwrap().lines() {
    ///     println!("{}", line.unwrap());
    /// }
    /// child.wait().unwrap();
    /// ```
    pub fn lines(&mut self) -> Lines<&mut Self> {
        Lines { reader: self, done: false }
    }

    /// Owning version of [`lines`](Self::lines).
    pub fn into_lines(self) -> Lines<Self> {
        Lines { reader: self, done: false }
    }

    /// Read everything up to end-of-stream.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, StreamError> {
        let mut buf = Vec::new();
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read everything up to end-of-stream as text.
    pub fn read_to_string(&mut self) -> Result<String, StreamError> {
        self.read_to_end().map(into_text)
    }

    /// Release the pipe.
    pub fn close(&mut self) -> Result<(), StreamError> {
        self.inner.take().map(drop).ok_or(StreamError::Closed)
    }

    /// Whether the pipe was already released.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Stream this reader is attached to.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Whether any data was requested from this reader.
    pub(crate) fn is_used(&self) -> bool {
        self.used
    }

    fn reader(&mut self) -> Result<&mut BufReader<Pipe>, StreamError> {
        let reader = self.inner.as_mut().ok_or(StreamError::Closed)?;
        self.used = true;
        Ok(reader)
    }
}

impl Read for BufferedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.reader()?.read(buf)?)
    }
}

impl BufRead for BufferedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.reader()?.fill_buf()?)
    }

    fn consume(&mut self, amt: usize) {
        if let Some(reader) = self.inner.as_mut() {
            reader.consume(amt);
        }
    }
}

impl Debug for BufferedReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedReader")
            .field("slot", &self.slot)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Single-pass iterator over the lines of a [`BufferedReader`].
///
/// Created by [`BufferedReader::lines`] and [`BufferedReader::into_lines`].
#[derive(Debug)]
pub struct Lines<R> {
    reader: R,
    done: bool,
}

impl<R: BorrowMut<BufferedReader>> Iterator for Lines<R> {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.borrow_mut().read_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(error) => {
                self.done = true;
                Some(Err(error))
            },
        }
    }
}

impl<R: BorrowMut<BufferedReader>> FusedIterator for Lines<R> {}

fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}
