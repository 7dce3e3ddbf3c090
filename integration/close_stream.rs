use kommand::error::StreamError;
use kommand::process::Stdio;

use crate::script;

pub fn run() {
    let mut child = script("echo").stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();

    // A closed reader vanishes from the accessor.
    let mut stdout = child.take_stdout().unwrap();
    stdout.close().unwrap();
    assert!(stdout.is_closed());
    assert!(matches!(stdout.read_line(), Err(StreamError::Closed)));
    assert!(matches!(stdout.close(), Err(StreamError::Closed)));

    // Same for the writer.
    let mut stdin = child.take_stdin().unwrap();
    stdin.close().unwrap();
    assert!(matches!(stdin.write_line("late"), Err(StreamError::Closed)));
    assert!(matches!(stdin.flush(), Err(StreamError::Closed)));
    assert!(matches!(stdin.close(), Err(StreamError::Closed)));

    child.wait().unwrap();

    // Closed streams collect as empty output. The child may see a broken pipe,
    // so only the collected bytes are checked.
    let mut child = script("print")
        .args(["stdout", "is", "ignored"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child.stdout().unwrap().close().unwrap();
    assert!(child.stdout().is_none());

    let output = child.wait_with_output().unwrap();
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}
