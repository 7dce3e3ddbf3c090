use kommand::error::WaitError;
use kommand::process::{Slot, Stdio};

use crate::script;

pub fn run() {
    let mut child = script("interval").args(["3", "10"]).stdout(Stdio::piped()).spawn().unwrap();

    // Partially read output cannot be collected.
    let first = child.stdout().unwrap().read_line().unwrap();
    assert_eq!(first.as_deref(), Some("0"));
    let err = child.wait_with_output().unwrap_err();
    assert!(matches!(err, WaitError::StreamInUse(Slot::Stdout)));

    // The child is still usable after the rejection.
    let rest: Vec<String> = child.stdout().unwrap().lines().map(Result::unwrap).collect();
    assert_eq!(rest, ["1", "2"]);
    assert!(child.wait().unwrap().success());

    // Taken streams are rejected the same way.
    let mut child = script("print")
        .arg("x")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let _stderr = child.take_stderr().unwrap();
    assert!(matches!(child.wait_with_output(), Err(WaitError::StreamInUse(Slot::Stderr))));
    assert!(child.wait().unwrap().success());
}
