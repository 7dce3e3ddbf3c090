#![cfg(unix)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use kommand::error::WaitError;
use kommand::process::{Command, Slot, Stdio};

#[test]
fn shell_function_output() {
    let output = Command::new("sh")
        .args(["-c", "f() { echo username=a; echo password=b; }; f get"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout_text(), "username=a\npassword=b\n");
    assert!(output.stderr.is_empty());
}

#[test]
fn path_lookup() {
    let status = Command::new("true").status().unwrap();
    assert!(status.success());

    let status = Command::new("false").status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn cat_round_trip() {
    let mut child =
        Command::new("cat").stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();

    let stdin = child.stdin().unwrap();
    stdin.write_line("first").unwrap();
    stdin.write_bytes(b"second\r\n").unwrap();
    stdin.flush().unwrap();

    let stdout = child.stdout().unwrap();
    assert_eq!(stdout.read_line().unwrap().as_deref(), Some("first"));
    assert_eq!(stdout.read_line().unwrap().as_deref(), Some("second"));

    // Partially read output rejects the collecting wait and leaves stdin open.
    child.stdin().unwrap().write_line("third").unwrap();
    let err = child.wait_with_output().unwrap_err();
    assert!(matches!(err, WaitError::StreamInUse(Slot::Stdout)));

    child.stdin().unwrap().close().unwrap();
    assert_eq!(child.stdout().unwrap().read_to_string().unwrap(), "third\n");
    assert!(child.wait().unwrap().success());
}

#[test]
fn stdin_closed_by_collecting_wait() {
    let mut child =
        Command::new("cat").stdin(Stdio::piped()).stdout(Stdio::piped()).spawn().unwrap();
    child.stdin().unwrap().write_line("buffered").unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout_text(), "buffered\n");
}

#[test]
fn buffered_stdin_behind_full_stdout() {
    let mut child = Command::new("sh")
        .args(["-c", "head -c 1048576 /dev/zero; cat >/dev/null"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    // Fill most of the stdin pipe, then leave a tail in the writer's buffer.
    let stdin = child.stdin().unwrap();
    stdin.write_bytes(&[b'a'; 60 * 1024]).unwrap();
    stdin.write_bytes(&[b'b'; 6 * 1024]).unwrap();

    // The child only reads stdin after its stdout was consumed.
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(child.wait_with_output());
    });
    let output = receiver.recv_timeout(Duration::from_secs(30)).unwrap().unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout.len(), 1048576);
}

#[test]
fn stdin_null_for_output() {
    let output = Command::new("cat").stdin(Stdio::null()).output().unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn invalid_utf8_is_replaced() {
    let mut child = Command::new("printf")
        .arg("ok\\377\\n")
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let line = child.stdout().unwrap().read_line().unwrap();
    assert_eq!(line.as_deref(), Some("ok\u{FFFD}"));
    child.wait().unwrap();
}
