use kommand::process::Stdio;

use crate::script;

pub fn run() {
    // Only piped streams have a parent end.
    let mut child = script("echo")
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(child.stdin().is_none());
    assert!(child.stdout().is_none());
    assert!(child.stderr().is_none());
    assert!(child.take_stdout().is_none());

    // A null stdin is at end-of-input immediately.
    assert!(child.wait().unwrap().success());

    let mut child = script("echo").stdin(Stdio::null()).stdout(Stdio::piped()).spawn().unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
